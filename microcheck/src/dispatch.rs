// Copyright (c) The microcheck Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{ExpectedError, utf8_workspace_root},
    output::{OutputContext, OutputOpts, OutputWriter},
};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand, ValueEnum};
use itertools::Itertools;
use microcheck_filtering::TagSet;
use microcheck_metadata::{MicrocheckExitCode, OperatingSystem};
use microcheck_runner::{
    build_graph::BazelCli,
    config::MicrocheckConfig,
    errors::ConfigurationError,
    executor::{DockerCli, Executor, ExecutorKind, ExecutorOptions, ShardAssignment},
    partition::ShardSpec,
    select::{SelectionContext, SelectionMode, SelectionRequest, TargetSelector},
    store::{JsonFileStore, TestMetadataStore},
    vcs::{ChangeContext, GitCli},
};
use serde::Serialize;
use std::io::Write;
use tracing::{debug, warn};

/// Select, filter and shard CI test targets.
///
/// microcheck picks the test targets a CI worker runs: a team/tag query against the build graph,
/// narrowed by flaky and high-impact information, then split into shards across workers.
#[derive(Debug, Parser)]
#[command(
    name = "microcheck",
    version,
    max_term_width = 100,
    propagate_version = true
)]
pub struct MicrocheckApp {
    #[clap(flatten)]
    common: CommonOpts,

    #[command(subcommand)]
    command: Command,
}

impl MicrocheckApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.common.output.init()
    }

    /// Executes the app, returning the process exit code on success.
    pub fn exec(self, output_writer: &mut OutputWriter) -> Result<i32, ExpectedError> {
        match self.command {
            Command::Select(opts) => opts.exec(&self.common, output_writer),
            Command::Query(opts) => opts.exec(output_writer),
            Command::Shard(opts) => opts.exec(&self.common, output_writer),
        }
    }
}

#[derive(Debug, Args)]
struct CommonOpts {
    /// Workspace root to run in [default: current directory]
    #[arg(long, global = true, value_name = "DIR", env = "MICROCHECK_WORKSPACE_ROOT")]
    workspace_root: Option<Utf8PathBuf>,

    /// Config file [default: workspace-root/.config/microcheck.toml]
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,

    #[clap(flatten)]
    output: OutputOpts,
}

impl CommonOpts {
    fn workspace_root(&self) -> Result<Utf8PathBuf, ExpectedError> {
        match &self.workspace_root {
            Some(root) => Ok(root.clone()),
            None => {
                let cwd = std::env::current_dir()
                    .map_err(|err| ExpectedError::CurrentDirFailed { err })?;
                utf8_workspace_root(cwd)
            }
        }
    }

    fn load_config(&self) -> Result<MicrocheckConfig, ExpectedError> {
        let workspace_root = self.workspace_root()?;
        let config = MicrocheckConfig::from_sources(workspace_root, self.config_file.as_deref())?;
        Ok(config)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the targets this worker runs
    ///
    /// Queries the build graph for the team's tests, applies flaky and high-impact selection,
    /// then prints the targets in this worker's shards.
    Select(SelectOpts),

    /// Print the build-graph query that lists a team's candidate tests
    Query(QueryOpts),

    /// Print the executor and shard layout for a worker
    Shard(ShardOpts),
}

#[derive(Debug, Args)]
struct QueryOpts {
    /// Target patterns to query, e.g. `//python/ray/tests/...`
    #[arg(required = true, value_name = "TARGETS")]
    targets: Vec<String>,

    /// Team whose tests are selected
    #[arg(long)]
    team: String,

    /// Only select tests with at least one of these comma-separated tags
    #[arg(long, value_name = "TAGS")]
    only_tags: Option<TagSet>,

    /// Never select tests with any of these comma-separated tags (`manual` is always excluded)
    #[arg(long, value_name = "TAGS")]
    except_tags: Option<TagSet>,
}

impl QueryOpts {
    fn request(&self, os: OperatingSystem, mode: SelectionMode) -> SelectionRequest {
        SelectionRequest::new(self.targets.iter().cloned(), &*self.team, os)
            .only_tags(self.only_tags.clone().unwrap_or_default())
            .except_tags(self.except_tags.clone().unwrap_or_default())
            .mode(mode)
    }

    fn exec(self, output_writer: &mut OutputWriter) -> Result<i32, ExpectedError> {
        // The query doesn't depend on the operating system.
        let query = self
            .request(OperatingSystem::default(), SelectionMode::All)
            .candidate_query()?;
        let mut writer = output_writer.stdout_writer();
        writeln!(writer, "{query}").map_err(ExpectedError::write_output_error)?;
        writer.flush().map_err(ExpectedError::write_output_error)?;
        Ok(MicrocheckExitCode::OK)
    }
}

#[derive(Debug, Args)]
struct WorkerOpts {
    /// Operating system the tests run on: linux or windows
    #[arg(long, default_value = "linux", value_name = "OS")]
    os: String,

    /// Number of workers in the fleet
    #[arg(long, default_value_t = 1, value_name = "N")]
    workers: u64,

    /// This worker's ID, counting up from 0
    #[arg(long, default_value_t = 0, value_name = "ID")]
    worker_id: u64,

    /// Number of shards each worker runs
    #[arg(long, default_value_t = 1, value_name = "N")]
    parallelism_per_worker: u64,
}

impl WorkerOpts {
    fn shard_spec(&self, team: &str) -> Result<ShardSpec, ExpectedError> {
        let os: OperatingSystem = self.os.parse().map_err(ConfigurationError::from)?;
        let spec = ShardSpec::new(
            team,
            os,
            self.workers,
            self.worker_id,
            self.parallelism_per_worker,
        )
        .map_err(ConfigurationError::from)?;
        Ok(spec)
    }
}

#[derive(Debug, Args)]
#[command(next_help_heading = "Executor options")]
struct ExecutorArgs {
    /// Container network to attach to
    #[arg(long)]
    network: Option<String>,

    /// Number of GPUs to expose (Linux only)
    #[arg(long, default_value_t = 0)]
    gpus: u32,

    /// Temporary filesystem to mount (Linux only; only `tmpfs` is supported)
    #[arg(long, value_name = "FS")]
    tmp_filesystem: Option<String>,

    /// Build type the image was built with, e.g. `debug` or `asan`
    #[arg(long)]
    build_type: Option<String>,

    /// Extra environment variable for the tests, as KEY=VALUE or KEY
    #[arg(long = "test-env", value_name = "ENV")]
    test_envs: Vec<String>,
}

impl ExecutorArgs {
    fn assign(
        &self,
        spec: &ShardSpec,
        config: &MicrocheckConfig,
        install: bool,
    ) -> Result<Executor, ExpectedError> {
        let options = ExecutorOptions {
            image_tag: config.image_tag(spec.team()).map(str::to_owned),
            network: self.network.clone(),
            gpus: self.gpus,
            tmp_filesystem: self.tmp_filesystem.clone(),
            build_type: self.build_type.clone(),
            test_envs: self.test_envs.clone(),
            skip_installation: !install,
        };
        Ok(Executor::assign(spec, options)?)
    }
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, ValueEnum)]
enum MessageFormat {
    /// One target per line
    #[default]
    Plain,

    /// A JSON document describing the executor and its shards
    Json,
}

#[derive(Debug, Args)]
struct SelectOpts {
    #[clap(flatten)]
    query: QueryOpts,

    #[clap(flatten)]
    worker: WorkerOpts,

    /// Select flaky targets only
    #[arg(long)]
    flaky: bool,

    /// Select high-impact targets only
    #[arg(long)]
    high_impact: bool,

    /// Don't consult the test metadata store
    #[arg(long)]
    no_store: bool,

    /// Install the executor image with docker before selecting
    #[arg(long)]
    install: bool,

    /// Exit with an error if this worker's shards have no targets
    #[arg(long)]
    fail_on_empty: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t, value_name = "FORMAT")]
    message_format: MessageFormat,

    /// Base branch of the change being tested
    #[arg(long, env = ChangeContext::BASE_BRANCH_ENV, value_name = "BRANCH")]
    base_branch: Option<String>,

    /// Commit being tested
    #[arg(long, env = ChangeContext::COMMIT_ENV, value_name = "SHA")]
    commit: Option<String>,

    #[clap(flatten)]
    executor: ExecutorArgs,
}

impl SelectOpts {
    fn exec(
        self,
        common: &CommonOpts,
        output_writer: &mut OutputWriter,
    ) -> Result<i32, ExpectedError> {
        let config = common.load_config()?;
        let team = self.query.team.as_str();

        let spec = self.worker.shard_spec(team)?;
        let os = spec.operating_system();
        let executor = self.executor.assign(&spec, &config, self.install)?;

        let store = if self.no_store {
            debug!("test metadata store disabled on the command line");
            None
        } else {
            match config.store_path()? {
                Some(path) => Some(JsonFileStore::open(path)?),
                None => {
                    debug!("test metadata store disabled in config");
                    None
                }
            }
        };

        if self.install {
            let docker = DockerCli::new(config.docker_path(), config.docker_repository());
            executor.ensure_installed(&docker)?;
        }
        let vcs = GitCli::new(config.git_path(), config.git_remote(), config.workspace_root());
        let build_graph = BazelCli::new(config.bazel_path(), config.workspace_root());
        let change_context = ChangeContext::new(self.base_branch.clone(), self.commit.clone());
        let yaml_dir = config.yaml_dir();
        let cx = SelectionContext {
            vcs: &vcs,
            build_graph: &build_graph,
            store: store.as_ref().map(|store| store as &dyn TestMetadataStore),
            change_context: &change_context,
            yaml_dir: &yaml_dir,
        };

        let mode = SelectionMode::from_flags(self.flaky, self.high_impact);
        let request = self.query.request(os, mode);
        let selected = TargetSelector::new(cx).select_with_query(&executor, &request)?;
        let assignments = executor.worker_targets(&selected);
        if !has_targets(&assignments) {
            if self.fail_on_empty {
                return Err(ExpectedError::NoTargetsSelected {
                    team: team.to_owned(),
                    os,
                });
            }
            if selected.is_empty() {
                warn!("no targets selected for {team} on {os}");
            } else {
                warn!(
                    "{} targets selected for {team} on {os}, but none fall in shards {:?}",
                    selected.len(),
                    executor.shard_ids(),
                );
            }
        }

        write_selection(
            self.message_format,
            &executor,
            &assignments,
            output_writer,
        )?;
        Ok(MicrocheckExitCode::OK)
    }
}

#[derive(Debug, Args)]
struct ShardOpts {
    /// Team whose tests are run
    #[arg(long)]
    team: String,

    #[clap(flatten)]
    worker: WorkerOpts,

    #[clap(flatten)]
    executor: ExecutorArgs,
}

impl ShardOpts {
    fn exec(
        self,
        common: &CommonOpts,
        output_writer: &mut OutputWriter,
    ) -> Result<i32, ExpectedError> {
        let config = common.load_config()?;
        let spec = self.worker.shard_spec(&self.team)?;
        let executor = self.executor.assign(&spec, &config, false)?;

        let mut writer = output_writer.stdout_writer();
        write_shard_layout(&executor, &mut writer).map_err(ExpectedError::write_output_error)?;
        writer.flush().map_err(ExpectedError::write_output_error)?;
        Ok(MicrocheckExitCode::OK)
    }
}

/// Returns true if any of this worker's shards has a target.
fn has_targets(assignments: &[ShardAssignment]) -> bool {
    assignments
        .iter()
        .any(|assignment| !assignment.targets.is_empty())
}

fn write_shard_layout(executor: &Executor, writer: &mut dyn Write) -> std::io::Result<()> {
    let shard_ids = executor.shard_ids();
    writeln!(writer, "executor: {}", executor.kind())?;
    writeln!(writer, "image tag: {}", executor.image_tag())?;
    writeln!(writer, "shard count: {}", executor.shard_count())?;
    writeln!(writer, "shard ids: {}", shard_ids.format(" "))?;

    // Container settings are only listed when set.
    let options = executor.options();
    if let Some(network) = &options.network {
        writeln!(writer, "network: {network}")?;
    }
    if options.gpus > 0 {
        writeln!(writer, "gpus: {}", options.gpus)?;
    }
    if let Some(tmp_filesystem) = &options.tmp_filesystem {
        writeln!(writer, "tmp filesystem: {tmp_filesystem}")?;
    }
    if let Some(build_type) = &options.build_type {
        writeln!(writer, "build type: {build_type}")?;
    }
    for test_env in &options.test_envs {
        writeln!(writer, "test env: {test_env}")?;
    }
    Ok(())
}

#[derive(Serialize)]
struct SelectionSummary<'a> {
    executor: ExecutorKind,
    team: &'a str,
    image_tag: &'a str,
    options: &'a ExecutorOptions,
    shard_count: u64,
    shards: &'a [ShardAssignment],
}

fn write_selection(
    format: MessageFormat,
    executor: &Executor,
    assignments: &[ShardAssignment],
    output_writer: &mut OutputWriter,
) -> Result<(), ExpectedError> {
    let mut writer = output_writer.stdout_writer();
    match format {
        MessageFormat::Plain => {
            for target in assignments.iter().flat_map(|assignment| &assignment.targets) {
                writeln!(writer, "{target}").map_err(ExpectedError::write_output_error)?;
            }
        }
        MessageFormat::Json => {
            let summary = SelectionSummary {
                executor: executor.kind(),
                team: executor.team(),
                image_tag: executor.image_tag(),
                options: executor.options(),
                shard_count: executor.shard_count(),
                shards: assignments,
            };
            serde_json::to_writer_pretty(&mut writer, &summary)
                .map_err(|err| ExpectedError::SerializeOutputError { err })?;
            writeln!(writer).map_err(ExpectedError::write_output_error)?;
        }
    }
    writer.flush().map_err(ExpectedError::write_output_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use clap::CommandFactory;
    use indoc::indoc;
    use microcheck_metadata::Target;
    use pretty_assertions::assert_eq;

    #[test]
    fn verify_app() {
        MicrocheckApp::command().debug_assert();
    }

    fn run(args: &[&str]) -> Result<String, ExpectedError> {
        let app = MicrocheckApp::try_parse_from(args).expect("arguments are valid");
        let mut output = OutputWriter::Test { stdout: Vec::new() };
        let code = app.exec(&mut output)?;
        assert_eq!(code, MicrocheckExitCode::OK);
        match output {
            OutputWriter::Test { stdout } => Ok(String::from_utf8(stdout).expect("valid UTF-8")),
            OutputWriter::Normal => unreachable!("test writer was passed in"),
        }
    }

    #[test]
    fn parse_select() {
        let app = MicrocheckApp::try_parse_from([
            "microcheck",
            "select",
            "//python/...",
            "//cpp/...",
            "--team",
            "core",
            "--os",
            "windows",
            "--workers",
            "3",
            "--worker-id",
            "1",
            "--parallelism-per-worker",
            "2",
            "--only-tags",
            "gpu,large",
            "--flaky",
            "--message-format",
            "json",
            "--test-env",
            "A=1",
            "--test-env",
            "B",
        ])
        .unwrap();
        let Command::Select(opts) = app.command else {
            panic!("expected the select subcommand");
        };
        assert_eq!(opts.query.targets, ["//python/...", "//cpp/..."]);
        assert_eq!(opts.worker.os, "windows");
        assert_eq!(opts.worker.workers, 3);
        assert_eq!(opts.worker.worker_id, 1);
        assert_eq!(opts.worker.parallelism_per_worker, 2);
        assert_eq!(opts.query.only_tags, Some(TagSet::parse("gpu,large")));
        assert!(opts.flaky);
        assert!(!opts.high_impact);
        assert_eq!(opts.message_format, MessageFormat::Json);
        assert_eq!(opts.executor.test_envs, ["A=1", "B"]);
    }

    #[test]
    fn parse_errors() {
        for args in [
            &["microcheck", "select", "--team", "core"][..],
            &["microcheck", "shard", "--team", "core", "--workers", "many"],
            &["microcheck", "query", "//..."],
        ] {
            assert!(
                MicrocheckApp::try_parse_from(args).is_err(),
                "{args:?} should fail to parse"
            );
        }
    }

    #[test]
    fn query_prints_candidate_query() {
        let output = run(&[
            "microcheck",
            "query",
            "//python/...",
            "--team",
            "core",
            "--except-tags",
            "flaky",
        ])
        .unwrap();
        let query = SelectionRequest::new(["//python/..."], "core", OperatingSystem::Linux)
            .except_tags(TagSet::parse("flaky"))
            .candidate_query()
            .unwrap();
        assert_eq!(output, format!("{query}\n"));
        assert!(output.contains("manual"), "manual is always excluded");
    }

    #[test]
    fn shard_prints_layout() {
        let dir = Utf8TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".config")).unwrap();
        std::fs::write(
            dir.path().join(MicrocheckConfig::CONFIG_PATH),
            indoc! {r#"
                [teams.serve]
                image-tag = "servebuild-py311"
            "#},
        )
        .unwrap();

        let output = run(&[
            "microcheck",
            "--workspace-root",
            dir.path().as_str(),
            "shard",
            "--team",
            "core",
            "--workers",
            "3",
            "--worker-id",
            "1",
            "--parallelism-per-worker",
            "2",
        ])
        .unwrap();
        assert_eq!(
            output,
            indoc! {"
                executor: linux
                image tag: corebuild
                shard count: 6
                shard ids: 2 3
            "}
        );

        let output = run(&[
            "microcheck",
            "--workspace-root",
            dir.path().as_str(),
            "shard",
            "--team",
            "serve",
            "--os",
            "windows",
        ])
        .unwrap();
        assert!(output.starts_with("executor: windows\nimage tag: servebuild-py311\n"));
    }

    #[test]
    fn shard_lists_container_settings() {
        let dir = Utf8TempDir::new().unwrap();
        let output = run(&[
            "microcheck",
            "--workspace-root",
            dir.path().as_str(),
            "shard",
            "--team",
            "core",
            "--network",
            "ci-net",
            "--gpus",
            "2",
            "--tmp-filesystem",
            "tmpfs",
            "--build-type",
            "asan",
            "--test-env",
            "RAY_BACKEND_LOG_LEVEL=debug",
            "--test-env",
            "HOME",
        ])
        .unwrap();
        assert_eq!(
            output,
            indoc! {"
                executor: linux
                image tag: corebuild
                shard count: 1
                shard ids: 0
                network: ci-net
                gpus: 2
                tmp filesystem: tmpfs
                build type: asan
                test env: RAY_BACKEND_LOG_LEVEL=debug
                test env: HOME
            "}
        );
    }

    #[test]
    fn unknown_os_is_configuration_error() {
        let dir = Utf8TempDir::new().unwrap();
        let err = run(&[
            "microcheck",
            "--workspace-root",
            dir.path().as_str(),
            "shard",
            "--team",
            "core",
            "--os",
            "macos",
        ])
        .unwrap_err();
        assert!(
            matches!(
                &err,
                ExpectedError::ConfigurationError {
                    err: ConfigurationError::UnknownOperatingSystem(_)
                }
            ),
            "unexpected error: {err:?}"
        );
        assert_eq!(
            err.process_exit_code(),
            MicrocheckExitCode::CONFIGURATION_ERROR
        );
    }

    #[test]
    fn select_requires_store_path_when_enabled() {
        // The default config enables the store without a path.
        let dir = Utf8TempDir::new().unwrap();
        let err = run(&[
            "microcheck",
            "--workspace-root",
            dir.path().as_str(),
            "select",
            "//...",
            "--team",
            "core",
        ])
        .unwrap_err();
        assert!(
            matches!(
                &err,
                ExpectedError::ConfigurationError {
                    err: ConfigurationError::StorePathMissing
                }
            ),
            "unexpected error: {err:?}"
        );
        assert_eq!(
            err.process_exit_code(),
            MicrocheckExitCode::CONFIGURATION_ERROR
        );
    }

    #[test]
    fn worker_without_targets() {
        // Two targets over three shards leave the last shard empty.
        let targets: Vec<Target> = ["//a", "//b"].into_iter().map(Target::from).collect();
        let spec = ShardSpec::new("core", OperatingSystem::Linux, 3, 2, 1).unwrap();
        let executor = Executor::assign(&spec, ExecutorOptions::default()).unwrap();
        let assignments = executor.worker_targets(&targets);
        assert_eq!(assignments.len(), 1);
        assert!(!has_targets(&assignments));

        let spec = ShardSpec::new("core", OperatingSystem::Linux, 3, 0, 1).unwrap();
        let executor = Executor::assign(&spec, ExecutorOptions::default()).unwrap();
        assert!(has_targets(&executor.worker_targets(&targets)));
        assert!(!has_targets(&executor.worker_targets(&[])));
    }

    #[test]
    fn shard_rejects_bad_layout() {
        let dir = Utf8TempDir::new().unwrap();
        let err = run(&[
            "microcheck",
            "--workspace-root",
            dir.path().as_str(),
            "shard",
            "--team",
            "core",
            "--workers",
            "2",
            "--worker-id",
            "2",
        ])
        .unwrap_err();
        assert_eq!(
            err.process_exit_code(),
            MicrocheckExitCode::CONFIGURATION_ERROR
        );
    }

    #[test]
    fn selection_formats() {
        let spec = ShardSpec::new("core", OperatingSystem::Linux, 2, 1, 1).unwrap();
        let executor = Executor::assign(&spec, ExecutorOptions::default()).unwrap();
        let targets: Vec<Target> = ["//d", "//a", "//c", "//b"]
            .into_iter()
            .map(Target::from)
            .collect();
        let assignments = executor.worker_targets(&targets);

        let mut output = OutputWriter::Test { stdout: Vec::new() };
        write_selection(MessageFormat::Plain, &executor, &assignments, &mut output).unwrap();
        let OutputWriter::Test { stdout } = &output else {
            unreachable!()
        };
        assert_eq!(String::from_utf8_lossy(stdout), "//c\n//d\n");

        let mut output = OutputWriter::Test { stdout: Vec::new() };
        write_selection(MessageFormat::Json, &executor, &assignments, &mut output).unwrap();
        let OutputWriter::Test { stdout } = &output else {
            unreachable!()
        };
        let json: serde_json::Value = serde_json::from_slice(stdout).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "executor": "linux",
                "team": "core",
                "image_tag": "corebuild",
                "options": {"gpus": 0},
                "shard_count": 2,
                "shards": [{"shard_id": 1, "targets": ["//c", "//d"]}],
            })
        );
    }
}
