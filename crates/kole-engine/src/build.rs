//! Build orchestration: walk source directories, compile stale files, link, run.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use rayon::prelude::{IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator};
use walkdir::WalkDir;

use kole_config::{BuildConfig, Role};
use kole_platform::Platform;
use kole_util::Executor;

use crate::command::CommandSynthesizer;
use crate::error::EngineError;
use crate::flags::FlagManager;
use crate::pattern::PatternMatcher;
use crate::source::{SourceFile, SourceKind};

/// Options controlling a build invocation.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Recompile every file regardless of modification times.
    pub rebuild: bool,
    /// Maximum number of compile commands run at once. `1` is fully sequential.
    pub jobs: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            rebuild: false,
            jobs: 1,
        }
    }
}

/// Where the pipeline currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Setup,
    Compile,
    Link,
    Run,
    Done,
    /// A compile or link command failed, or a precondition was broken.
    Failed,
    /// The build succeeded but the program exited with a non-zero code.
    RunFailed,
}

/// Counts from a compile pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileSummary {
    /// Files whose command was executed.
    pub compiled: usize,
    /// Files skipped because their artifact is newer than the source.
    pub up_to_date: usize,
    /// Files skipped because Kole does not know how to build them.
    pub unsupported: usize,
}

/// Whether the link step produced a binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkOutcome {
    Linked(PathBuf),
    /// The object directory was empty, nothing was linked.
    Skipped,
}

/// Result of [`build`].
#[derive(Debug)]
pub struct BuildResult {
    pub summary: CompileSummary,
    pub link: LinkOutcome,
    /// How long compiling and linking took.
    pub duration: Duration,
}

/// One planned compile, generate or meta-compile step.
#[derive(Debug)]
struct CompileJob {
    source: PathBuf,
    output: PathBuf,
    kind: SourceKind,
    command: String,
}

/// Drives the compile → link → run pipeline for one configuration.
pub struct Builder<'a> {
    config: &'a BuildConfig,
    platform: Platform,
    executor: &'a dyn Executor,
    patterns: PatternMatcher,
    flags: FlagManager<'a>,
    directories: Option<Vec<PathBuf>>,
    link: Option<LinkOutcome>,
    jobs: usize,
    state: BuildState,
}

impl<'a> Builder<'a> {
    /// Create a builder for the platform named in the configuration.
    pub fn new(config: &'a BuildConfig, options: &BuildOptions, executor: &'a dyn Executor) -> Self {
        Self::with_platform(config, Platform::resolve(&config.platform), options, executor)
    }

    /// Create a builder for an explicit platform.
    pub fn with_platform(
        config: &'a BuildConfig,
        platform: Platform,
        options: &BuildOptions,
        executor: &'a dyn Executor,
    ) -> Self {
        Self {
            config,
            platform,
            executor,
            patterns: PatternMatcher::new(),
            flags: FlagManager::new(config, platform),
            directories: None,
            link: None,
            jobs: options.jobs.max(1),
            state: BuildState::Setup,
        }
    }

    pub fn state(&self) -> BuildState {
        self.state
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// The directories to scan, in the order they must be compiled.
    ///
    /// UI descriptions come first, then meta-compiled headers, then plain
    /// sources, because later steps may include what earlier ones generate.
    /// Duplicates keep their first position.
    pub fn setup_directories(&mut self) -> &[PathBuf] {
        let config = self.config;
        self.directories.get_or_insert_with(|| {
            let qt = &config.qt_support;
            let mut roles = Vec::new();
            if qt.compile_ui {
                roles.push(Role::Ui);
            }
            if qt.compile_moc {
                roles.push(Role::Include);
            }
            roles.push(Role::Src);

            let mut ordered: Vec<PathBuf> = Vec::new();
            for role in roles {
                for dir in config.dirs(role) {
                    let path = PathBuf::from(dir);
                    if !ordered.contains(&path) {
                        ordered.push(path);
                    }
                }
            }
            tracing::debug!("Directories to scan: {ordered:?}");
            ordered
        })
    }

    /// Compile every stale file in the scanned directories.
    ///
    /// With `rebuild`, every supported file is compiled regardless of timestamps.
    ///
    /// # Errors
    /// Returns [`EngineError::CommandFailed`] as soon as one command exits with a
    /// non-zero code; nothing after it is compiled.
    pub fn compile_object_files(&mut self, rebuild: bool) -> Result<CompileSummary, EngineError> {
        let directories = self.setup_directories().to_vec();
        self.state = BuildState::Compile;

        let mut summary = CompileSummary::default();
        for dir in &directories {
            let jobs = self.plan_directory(dir, rebuild, &mut summary);
            match self.execute_jobs(&jobs) {
                Ok(executed) => summary.compiled += executed,
                Err(e) => {
                    self.state = BuildState::Failed;
                    return Err(e);
                }
            }
        }

        tracing::debug!(
            "Compiled {} file(s), {} up to date, {} unsupported",
            summary.compiled,
            summary.up_to_date,
            summary.unsupported
        );
        Ok(summary)
    }

    /// Walk `dir` and collect the commands for files that need building.
    fn plan_directory(
        &mut self,
        dir: &Path,
        rebuild: bool,
        summary: &mut CompileSummary,
    ) -> Vec<CompileJob> {
        let config = self.config;
        let exclude = &config.exclude;
        let mut jobs = Vec::new();

        if self.patterns.matches(dir, exclude) {
            tracing::warn!("Skipping excluded directory {}", dir.display());
            return jobs;
        }
        if !dir.is_dir() {
            tracing::warn!("Directory {} doesn't exist, skipping", dir.display());
            return jobs;
        }

        let synth = CommandSynthesizer::new(config, &self.flags);
        let patterns = &mut self.patterns;
        let walker = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !patterns.matches(entry.path(), exclude));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::error!("Cannot read entry in {}: {e}", dir.display());
                    continue;
                }
            };
            // Symlinks to files count as files.
            if !entry.path().is_file() {
                continue;
            }

            let file = SourceFile::new(entry.path(), &config.qt_support);
            let planned = file.kind.and_then(|kind| {
                let output = synth.artifact_path(&file.stem, &file.extension)?;
                Some((kind, output))
            });
            let Some((kind, output)) = planned else {
                tracing::warn!("Skipping {} (unsupported file type)", file.path.display());
                summary.unsupported += 1;
                continue;
            };

            if !needs_compile(&file.path, &output, rebuild) {
                tracing::debug!("Skipping {} (up to date)", file.path.display());
                summary.up_to_date += 1;
                continue;
            }

            let Some(command) = synth.compile_command(&file.extension, &file.path, &output) else {
                tracing::warn!("Skipping {} (unsupported file type)", file.path.display());
                summary.unsupported += 1;
                continue;
            };

            jobs.push(CompileJob {
                source: file.path,
                output,
                kind,
                command,
            });
        }

        jobs
    }

    /// Run planned jobs, sequentially or on a bounded pool. Returns how many ran.
    fn execute_jobs(&self, jobs: &[CompileJob]) -> Result<usize, EngineError> {
        if self.jobs <= 1 || jobs.len() <= 1 {
            for job in jobs {
                if let Err(e) = run_job(self.executor, job) {
                    report_failure(job, &e);
                    return Err(e);
                }
            }
            return Ok(jobs.len());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .map_err(|e| EngineError::WorkerPool {
                message: e.to_string(),
            })?;

        // Index of the earliest failed job. Jobs after it are skipped, jobs
        // before it still run, so the reported failure matches sequential order.
        // Failures are logged after the pool drains, only for that job.
        let first_failure = AtomicUsize::new(usize::MAX);
        let executor = self.executor;
        let results: Vec<Result<bool, EngineError>> = pool.install(|| {
            jobs.par_iter()
                .enumerate()
                .map(|(index, job)| {
                    if index > first_failure.load(Ordering::SeqCst) {
                        return Ok(false);
                    }
                    let result = run_job(executor, job);
                    if result.is_err() {
                        first_failure.fetch_min(index, Ordering::SeqCst);
                    }
                    result.map(|()| true)
                })
                .collect()
        });

        let mut executed = 0;
        for (job, result) in jobs.iter().zip(results) {
            match result {
                Ok(true) => executed += 1,
                Ok(false) => {}
                Err(e) => {
                    report_failure(job, &e);
                    return Err(e);
                }
            }
        }
        Ok(executed)
    }

    /// Link every file in the object directory into the output binary.
    ///
    /// The object directory is the source of truth, so files compiled by
    /// earlier runs are linked too. An empty directory skips linking.
    ///
    /// # Errors
    /// Returns [`EngineError::CommandFailed`] if the link command exits with a non-zero code.
    pub fn link_object_files(&mut self) -> Result<LinkOutcome, EngineError> {
        self.state = BuildState::Link;

        let objects = match self.config.first_dir(Role::Obj) {
            Some(obj) if Path::new(obj).is_dir() => kole_util::fs::list_files(Path::new(obj))
                .unwrap_or_else(|e| {
                    tracing::error!("{e}");
                    Vec::new()
                }),
            _ => Vec::new(),
        };

        if objects.is_empty() {
            tracing::warn!("No object files found, skipping linking");
            self.state = BuildState::Done;
            self.link = Some(LinkOutcome::Skipped);
            return Ok(LinkOutcome::Skipped);
        }

        let output = self.binary_path();
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = kole_util::fs::ensure_dir(parent) {
                tracing::error!("{e}");
            }
        }

        let command = CommandSynthesizer::new(self.config, &self.flags).link_command(&objects, &output);
        if let Err(e) = execute(self.executor, &command) {
            log_command_failure(&command, &e);
            tracing::error!("Failed when linking project");
            self.state = BuildState::Failed;
            return Err(e);
        }

        tracing::info!("Build successful");
        self.state = BuildState::Done;
        self.link = Some(LinkOutcome::Linked(output.clone()));
        Ok(LinkOutcome::Linked(output))
    }

    /// Run the linked binary with `args` appended. Returns its exit code.
    ///
    /// A non-zero exit code does not fail the build; it is logged and leaves
    /// the builder in [`BuildState::RunFailed`].
    ///
    /// # Errors
    /// Returns [`EngineError::MissingBinary`] if the binary was never produced,
    /// [`EngineError::NothingLinked`] if this builder's link step found no
    /// objects, or an error if it cannot be started.
    pub fn run_binary_executable(&mut self, args: &str) -> Result<i32, EngineError> {
        let binary = self.binary_path();
        if self.link == Some(LinkOutcome::Skipped) {
            self.state = BuildState::Failed;
            return Err(EngineError::NothingLinked {
                path: binary.display().to_string(),
            });
        }
        if !binary.is_file() {
            self.state = BuildState::Failed;
            return Err(EngineError::MissingBinary {
                path: binary.display().to_string(),
            });
        }

        self.state = BuildState::Run;
        let command = CommandSynthesizer::run_command(&binary, args, self.platform);
        tracing::info!("Running `{command}`");

        let code = self.executor.run(&command)?;
        if code == 0 {
            self.state = BuildState::Done;
        } else {
            tracing::warn!("{} exited with code {code}", binary.display());
            self.state = BuildState::RunFailed;
        }
        Ok(code)
    }

    /// `<bin dir>/<output>[.<extension>]`, with `auto` resolved for the platform.
    pub fn binary_path(&self) -> PathBuf {
        let extension = if self.config.extension.eq_ignore_ascii_case(kole_config::config::AUTO) {
            self.platform.default_extension()
        } else {
            self.config.extension.as_str()
        };

        let file_name = if extension.is_empty() {
            self.config.output.clone()
        } else {
            format!("{}.{extension}", self.config.output)
        };

        let bin = self.config.first_dir(Role::Bin).unwrap_or_default();
        Path::new(bin).join(file_name)
    }
}

/// Compile stale files and link them.
///
/// # Errors
/// Returns an error if any compile or link command fails.
pub fn build(
    config: &BuildConfig,
    options: &BuildOptions,
    executor: &dyn Executor,
) -> Result<BuildResult, EngineError> {
    let start = Instant::now();
    let mut builder = Builder::new(config, options, executor);
    let summary = builder.compile_object_files(options.rebuild)?;
    let link = builder.link_object_files()?;

    Ok(BuildResult {
        summary,
        link,
        duration: start.elapsed(),
    })
}

/// Whether `source` must be rebuilt into `artifact`.
///
/// True when forced, when the artifact is missing, or when the source is newer.
pub fn needs_compile(source: &Path, artifact: &Path, rebuild: bool) -> bool {
    if rebuild {
        return true;
    }
    let Ok(artifact_time) = kole_util::fs::modified_time(artifact) else {
        return true;
    };
    match kole_util::fs::modified_time(source) {
        Ok(source_time) => source_time > artifact_time,
        Err(_) => true,
    }
}

fn run_job(executor: &dyn Executor, job: &CompileJob) -> Result<(), EngineError> {
    if let Some(parent) = job.output.parent().filter(|p| !p.as_os_str().is_empty()) {
        kole_util::fs::ensure_dir(parent)?;
    }

    execute(executor, &job.command)?;
    tracing::info!("{} {}", job.kind.verb(), job.source.display());
    Ok(())
}

fn execute(executor: &dyn Executor, command: &str) -> Result<(), EngineError> {
    tracing::debug!("Running `{command}`");
    let code = executor.run(command)?;
    if code != 0 {
        return Err(EngineError::CommandFailed {
            command: command.to_owned(),
            code,
        });
    }
    Ok(())
}

fn report_failure(job: &CompileJob, err: &EngineError) {
    log_command_failure(&job.command, err);
    tracing::error!("Failed when compiling {}", job.source.display());
}

fn log_command_failure(command: &str, err: &EngineError) {
    match err {
        EngineError::CommandFailed { code, .. } => {
            tracing::error!("Command exited with code {code}: {command}");
        }
        other => tracing::error!("Command: {command}: {other}"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::fs;
    use std::sync::Mutex;
    use std::time::SystemTime;

    use super::*;
    use kole_config::DirList;
    use kole_util::UtilError;
    use tracing_test::traced_test;

    /// Records every command and imitates the tool by writing the `-o` target.
    #[derive(Default)]
    struct RecordingExecutor {
        commands: Mutex<Vec<String>>,
        fail_on: Vec<String>,
        exit_code: i32,
        slow_on: Option<String>,
    }

    impl RecordingExecutor {
        fn failing_on(needles: &[&str]) -> Self {
            Self {
                fail_on: needles.iter().map(|n| (*n).to_owned()).collect(),
                ..Self::default()
            }
        }

        fn commands(&self) -> Vec<String> {
            self.commands.lock().unwrap().clone()
        }
    }

    impl Executor for RecordingExecutor {
        fn run(&self, command_line: &str) -> Result<i32, UtilError> {
            if let Some(needle) = &self.slow_on {
                if command_line.contains(needle.as_str()) {
                    std::thread::sleep(Duration::from_millis(300));
                }
            }
            self.commands.lock().unwrap().push(command_line.to_owned());
            if self.fail_on.iter().any(|n| command_line.contains(n.as_str())) {
                return Ok(1);
            }

            let mut tokens = command_line.split_whitespace();
            while let Some(token) = tokens.next() {
                if token == "-o" {
                    if let Some(output) = tokens.next() {
                        fs::write(output, b"artifact").unwrap();
                    }
                    break;
                }
            }
            Ok(self.exit_code)
        }
    }

    struct Project {
        _tmp: tempfile::TempDir,
        root: PathBuf,
    }

    impl Project {
        fn new() -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let root = tmp.path().to_path_buf();
            fs::create_dir_all(root.join("src")).unwrap();
            Self { _tmp: tmp, root }
        }

        fn path(&self, rel: &str) -> PathBuf {
            self.root.join(rel)
        }

        fn dir(&self, rel: &str) -> String {
            self.path(rel).display().to_string()
        }

        fn write(&self, rel: &str) -> PathBuf {
            let path = self.path(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, b"// source").unwrap();
            path
        }

        fn config(&self) -> BuildConfig {
            let mut config = BuildConfig::default();
            config.directories.src = DirList::new([self.dir("src")]);
            config.directories.obj = DirList::new([self.dir("obj")]);
            config.directories.bin = DirList::new([self.dir("bin")]);
            config.directories.include = DirList::new([self.dir("include")]);
            config.flags.clear();
            config.flags.insert("common".to_owned(), "-Wall".to_owned());
            config.flags.insert("linux".to_owned(), String::new());
            config
        }
    }

    fn set_mtime(path: &Path, secs: u64) {
        fs::File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
            .unwrap();
    }

    fn builder<'a>(config: &'a BuildConfig, exec: &'a RecordingExecutor) -> Builder<'a> {
        Builder::with_platform(config, Platform::Linux, &BuildOptions::default(), exec)
    }

    #[test]
    fn single_source_compiles_and_links() {
        let project = Project::new();
        let source = project.write("src/a.cpp");
        let config = project.config();
        let exec = RecordingExecutor::default();

        let mut builder = builder(&config, &exec);
        let summary = builder.compile_object_files(false).unwrap();
        assert_eq!(summary.compiled, 1);

        let object = project.path("obj/a.o");
        let binary = project.path("bin/main.out");
        assert_eq!(
            builder.link_object_files().unwrap(),
            LinkOutcome::Linked(binary.clone())
        );
        assert_eq!(builder.state(), BuildState::Done);

        let commands = exec.commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(
            commands.first().unwrap(),
            &format!(
                "g++ -std=c++17 -Og -Wall -c {} -o {} -I{}",
                source.display(),
                object.display(),
                project.dir("include")
            )
        );
        assert_eq!(
            commands.get(1).unwrap(),
            &format!("g++ {} -o {} -Og -Wall", object.display(), binary.display())
        );
    }

    #[test]
    fn second_run_compiles_nothing() {
        let project = Project::new();
        project.write("src/a.cpp");
        project.write("src/nested/b.cc");
        let config = project.config();

        let first = RecordingExecutor::default();
        assert_eq!(builder(&config, &first).compile_object_files(false).unwrap().compiled, 2);

        let second = RecordingExecutor::default();
        let summary = builder(&config, &second).compile_object_files(false).unwrap();
        assert_eq!(summary.compiled, 0);
        assert_eq!(summary.up_to_date, 2);
        assert!(second.commands().is_empty());
    }

    #[test]
    fn newer_source_is_recompiled() {
        let project = Project::new();
        let source = project.write("src/a.cpp");
        let object = project.write("obj/a.o");
        set_mtime(&object, 1_000);
        set_mtime(&source, 2_000);
        let config = project.config();
        let exec = RecordingExecutor::default();

        let summary = builder(&config, &exec).compile_object_files(false).unwrap();
        assert_eq!(summary.compiled, 1);
    }

    #[test]
    fn rebuild_ignores_newer_artifact() {
        let project = Project::new();
        let source = project.write("src/a.cpp");
        let object = project.write("obj/a.o");
        set_mtime(&source, 1_000);
        set_mtime(&object, 2_000);
        let config = project.config();

        let lazy = RecordingExecutor::default();
        assert_eq!(builder(&config, &lazy).compile_object_files(false).unwrap().compiled, 0);

        let forced = RecordingExecutor::default();
        assert_eq!(builder(&config, &forced).compile_object_files(true).unwrap().compiled, 1);
        assert_eq!(forced.commands().len(), 1);
    }

    #[test]
    fn staleness_rule() {
        let project = Project::new();
        let source = project.write("src/a.cpp");
        let artifact = project.path("obj/a.o");

        assert!(needs_compile(&source, &artifact, false));

        project.write("obj/a.o");
        set_mtime(&source, 5_000);
        set_mtime(&artifact, 5_000);
        assert!(!needs_compile(&source, &artifact, false));
        assert!(needs_compile(&source, &artifact, true));

        set_mtime(&source, 5_001);
        assert!(needs_compile(&source, &artifact, false));
    }

    #[test]
    #[traced_test]
    fn excluded_file_is_not_unsupported() {
        let project = Project::new();
        project.write("src/a.cpp");
        project.write("src/scratch.tmp");
        let mut config = project.config();
        config.exclude = vec!["*.tmp".to_owned()];
        let exec = RecordingExecutor::default();

        let summary = builder(&config, &exec).compile_object_files(false).unwrap();
        assert_eq!(summary.compiled, 1);
        assert_eq!(summary.unsupported, 0);
        assert!(exec.commands().iter().all(|c| !c.contains("scratch.tmp")));
        assert!(!logs_contain("unsupported file type"));
    }

    #[test]
    fn excluded_directories_are_pruned() {
        let project = Project::new();
        project.write("src/a.cpp");
        project.write("src/generated/x.cpp");
        project.write("src/generated/deeper/y.cpp");
        let mut config = project.config();
        config.exclude = vec!["*/generated".to_owned()];
        let exec = RecordingExecutor::default();

        let summary = builder(&config, &exec).compile_object_files(false).unwrap();
        assert_eq!(summary.compiled, 1);
        assert!(exec.commands().iter().all(|c| !c.contains("generated")));
    }

    #[test]
    #[traced_test]
    fn excluded_source_root_is_skipped() {
        let project = Project::new();
        project.write("src/a.cpp");
        let mut config = project.config();
        config.exclude = vec!["*/src".to_owned()];
        let exec = RecordingExecutor::default();

        let summary = builder(&config, &exec).compile_object_files(false).unwrap();
        assert_eq!(summary, CompileSummary::default());
        assert!(logs_contain("Skipping excluded directory"));
    }

    #[test]
    #[traced_test]
    fn unsupported_files_are_skipped_with_warning() {
        let project = Project::new();
        project.write("src/a.cpp");
        project.write("src/README.md");
        project.write("src/widget.hpp");
        let config = project.config();
        let exec = RecordingExecutor::default();

        let summary = builder(&config, &exec).compile_object_files(false).unwrap();
        assert_eq!(summary.compiled, 1);
        assert_eq!(summary.unsupported, 2);
        assert!(logs_contain("unsupported file type"));
    }

    #[test]
    #[traced_test]
    fn missing_source_directory_is_skipped() {
        let project = Project::new();
        let mut config = project.config();
        config.directories.src = DirList::new([project.dir("nope"), project.dir("src")]);
        project.write("src/a.cpp");
        let exec = RecordingExecutor::default();

        let summary = builder(&config, &exec).compile_object_files(false).unwrap();
        assert_eq!(summary.compiled, 1);
        assert!(logs_contain("doesn't exist"));
    }

    #[test]
    #[allow(clippy::panic)]
    fn failing_compile_stops_the_pipeline() {
        let project = Project::new();
        project.write("src/a.cpp");
        project.write("src/b.cpp");
        project.write("src/c.cpp");
        let config = project.config();
        let exec = RecordingExecutor::failing_on(&["b.cpp"]);

        let mut builder = builder(&config, &exec);
        let err = builder.compile_object_files(false).unwrap_err();
        match err {
            EngineError::CommandFailed { command, code } => {
                assert!(command.contains("b.cpp"), "{command}");
                assert_eq!(code, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(builder.state(), BuildState::Failed);

        let commands = exec.commands();
        assert_eq!(commands.len(), 2);
        assert!(commands.iter().all(|c| !c.contains("c.cpp")));
    }

    #[test]
    fn build_never_links_after_failed_compile() {
        let project = Project::new();
        project.write("src/a.cpp");
        project.write("obj/old.o");
        let mut config = project.config();
        config.platform = "linux".to_owned();
        let exec = RecordingExecutor::failing_on(&["a.cpp"]);

        let err = build(&config, &BuildOptions::default(), &exec).unwrap_err();
        assert!(err.to_string().contains("a.cpp"));
        assert_eq!(exec.commands().len(), 1);
        assert!(!project.path("bin").exists());
    }

    #[test]
    fn failing_link_is_fatal() {
        let project = Project::new();
        project.write("obj/a.o");
        let config = project.config();
        let exec = RecordingExecutor::failing_on(&["main.out"]);

        let mut builder = builder(&config, &exec);
        let err = builder.link_object_files().unwrap_err();
        assert!(matches!(err, EngineError::CommandFailed { .. }));
        assert_eq!(builder.state(), BuildState::Failed);
    }

    #[test]
    fn empty_object_directory_skips_linking() {
        let project = Project::new();
        fs::create_dir_all(project.path("obj")).unwrap();
        let config = project.config();
        let exec = RecordingExecutor::default();

        let mut builder = builder(&config, &exec);
        assert_eq!(builder.link_object_files().unwrap(), LinkOutcome::Skipped);
        assert!(exec.commands().is_empty());
        assert_eq!(builder.state(), BuildState::Done);
    }

    #[test]
    fn link_uses_existing_objects_without_compiling() {
        let project = Project::new();
        project.write("obj/b.o");
        project.write("obj/a.o");
        let config = project.config();
        let exec = RecordingExecutor::default();

        let mut builder = builder(&config, &exec);
        assert_eq!(builder.compile_object_files(false).unwrap().compiled, 0);
        assert!(matches!(builder.link_object_files().unwrap(), LinkOutcome::Linked(_)));

        let commands = exec.commands();
        let link = commands.first().unwrap();
        let a = project.path("obj/a.o").display().to_string();
        let b = project.path("obj/b.o").display().to_string();
        assert!(link.contains(&format!("{a} {b}")), "{link}");
    }

    #[test]
    fn setup_orders_ui_then_headers_then_sources() {
        let project = Project::new();
        let mut config = project.config();
        config.qt_support.compile_ui = true;
        config.qt_support.compile_moc = true;
        config.directories.ui = DirList::new([project.dir("forms"), project.dir("src")]);
        config.directories.include = DirList::new([project.dir("include")]);
        config.directories.src = DirList::new([project.dir("src"), project.dir("include")]);
        let exec = RecordingExecutor::default();

        let mut builder = builder(&config, &exec);
        assert_eq!(
            builder.setup_directories(),
            [project.path("forms"), project.path("src"), project.path("include")]
        );
    }

    #[test]
    fn setup_without_qt_is_sources_only() {
        let project = Project::new();
        let mut config = project.config();
        config.directories.ui = DirList::new([project.dir("forms")]);
        let exec = RecordingExecutor::default();

        let mut builder = builder(&config, &exec);
        assert_eq!(builder.setup_directories(), [project.path("src")]);
    }

    #[test]
    fn generation_steps_run_before_compilation() {
        let project = Project::new();
        project.write("forms/dialog.ui");
        project.write("include/window.hpp");
        project.write("src/main.cpp");
        let mut config = project.config();
        config.qt_support.compile_ui = true;
        config.qt_support.compile_moc = true;
        config.qt_support.ui_output_dir = project.dir("gen");
        config.directories.ui = DirList::new([project.dir("forms")]);
        let exec = RecordingExecutor::default();

        let summary = builder(&config, &exec).compile_object_files(false).unwrap();
        assert_eq!(summary.compiled, 3);

        let commands = exec.commands();
        assert!(commands.first().unwrap().starts_with("uic "));
        assert!(commands.get(1).unwrap().starts_with("moc "));
        assert!(commands.get(2).unwrap().starts_with("g++ "));
        assert!(project.path("gen/ui_dialog.h").is_file());
        assert!(project.path("obj/moc_window.cpp").is_file());
    }

    #[test]
    fn run_appends_arguments() {
        let project = Project::new();
        project.write("src/a.cpp");
        let config = project.config();
        let exec = RecordingExecutor::default();

        let mut builder = builder(&config, &exec);
        builder.compile_object_files(false).unwrap();
        builder.link_object_files().unwrap();
        assert_eq!(builder.run_binary_executable("--port 8080").unwrap(), 0);
        assert_eq!(builder.state(), BuildState::Done);

        let commands = exec.commands();
        assert_eq!(
            commands.last().unwrap(),
            &format!("{} --port 8080", project.path("bin/main.out").display())
        );
    }

    #[test]
    fn run_failure_is_its_own_outcome() {
        let project = Project::new();
        project.write("bin/main.out");
        let config = project.config();
        let exec = RecordingExecutor {
            exit_code: 3,
            ..RecordingExecutor::default()
        };

        let mut builder = builder(&config, &exec);
        assert_eq!(builder.run_binary_executable("").unwrap(), 3);
        assert_eq!(builder.state(), BuildState::RunFailed);
    }

    #[test]
    fn run_without_binary_is_an_error() {
        let project = Project::new();
        let config = project.config();
        let exec = RecordingExecutor::default();

        let mut builder = builder(&config, &exec);
        let err = builder.run_binary_executable("").unwrap_err();
        assert!(matches!(err, EngineError::MissingBinary { .. }));
        assert_eq!(builder.state(), BuildState::Failed);
        assert!(exec.commands().is_empty());
    }

    #[test]
    fn binary_path_extension_rules() {
        let project = Project::new();
        let exec = RecordingExecutor::default();
        let mut config = project.config();

        assert_eq!(builder(&config, &exec).binary_path(), project.path("bin/main.out"));

        let windows =
            Builder::with_platform(&config, Platform::Windows, &BuildOptions::default(), &exec)
                .binary_path();
        assert_eq!(windows, project.path("bin/main.exe"));

        config.extension = String::new();
        assert_eq!(builder(&config, &exec).binary_path(), project.path("bin/main"));

        config.extension = "bin".to_owned();
        config.output = "app".to_owned();
        assert_eq!(builder(&config, &exec).binary_path(), project.path("bin/app.bin"));
    }

    #[test]
    fn parallel_compile_builds_everything() {
        let project = Project::new();
        for name in ["a", "b", "c", "d", "e", "f"] {
            project.write(&format!("src/{name}.cpp"));
        }
        let config = project.config();
        let exec = RecordingExecutor::default();
        let options = BuildOptions {
            rebuild: false,
            jobs: 4,
        };

        let mut builder = Builder::with_platform(&config, Platform::Linux, &options, &exec);
        assert_eq!(builder.compile_object_files(false).unwrap().compiled, 6);
        assert_eq!(exec.commands().len(), 6);
    }

    #[test]
    #[traced_test]
    #[allow(clippy::panic)]
    fn parallel_compile_reports_first_failure_in_order() {
        let project = Project::new();
        for name in ["a", "b", "c", "d", "e", "f"] {
            project.write(&format!("src/{name}.cpp"));
        }
        let config = project.config();
        // b finishes after e, the report still names b.
        let exec = RecordingExecutor {
            slow_on: Some("b.cpp".to_owned()),
            ..RecordingExecutor::failing_on(&["e.cpp", "b.cpp"])
        };
        let options = BuildOptions {
            rebuild: false,
            jobs: 4,
        };

        let mut builder = Builder::with_platform(&config, Platform::Linux, &options, &exec);
        let err = builder.compile_object_files(false).unwrap_err();
        match err {
            EngineError::CommandFailed { command, .. } => {
                assert!(command.contains("b.cpp"), "{command}");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(builder.state(), BuildState::Failed);
        logs_assert(|lines: &[&str]| {
            let failures: Vec<&&str> = lines
                .iter()
                .filter(|line| line.contains("Failed when compiling"))
                .collect();
            match failures.as_slice() {
                [only] if only.contains("b.cpp") => Ok(()),
                other => Err(format!("expected one failure for b.cpp, got {other:?}")),
            }
        });
    }

    #[test]
    #[cfg(unix)]
    fn symlinked_sources_are_compiled() {
        let project = Project::new();
        let real = project.write("elsewhere/real.cpp");
        let link = project.path("src/linked.cpp");
        std::os::unix::fs::symlink(&real, &link).unwrap();
        let config = project.config();
        let exec = RecordingExecutor::default();

        let summary = builder(&config, &exec).compile_object_files(false).unwrap();
        assert_eq!(summary.compiled, 1);
        assert!(exec.commands().first().unwrap().contains("linked.cpp"));
        assert!(project.path("obj/linked.o").is_file());
    }

    #[test]
    fn blank_and_none_directory_entries_are_not_scanned() {
        let project = Project::new();
        let mut config = project.config();
        config.directories.src = DirList::new([String::new(), "none".to_owned(), project.dir("src")]);
        let exec = RecordingExecutor::default();

        let mut builder = builder(&config, &exec);
        assert_eq!(builder.setup_directories(), [project.path("src")]);
    }

    #[test]
    fn run_refuses_stale_binary_after_skipped_link() {
        let project = Project::new();
        project.write("bin/main.out");
        fs::create_dir_all(project.path("obj")).unwrap();
        let config = project.config();
        let exec = RecordingExecutor::default();

        let mut builder = builder(&config, &exec);
        assert_eq!(builder.link_object_files().unwrap(), LinkOutcome::Skipped);
        let err = builder.run_binary_executable("").unwrap_err();
        assert!(matches!(err, EngineError::NothingLinked { .. }));
        assert_eq!(builder.state(), BuildState::Failed);
        assert!(exec.commands().is_empty());
    }
}
