//! cdi-manifests - Render the Kubernetes resources of the CDI controller.
//!
//! This is the command-line entry point that:
//! - Initializes structured logging (stderr, so stdout stays a clean manifest)
//! - Loads the factory configuration from file, environment and flags
//! - Validates it, then prints the generated resources

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::error;

use cdi_manifests::config::load_config;
use cdi_manifests::render::{OutputFormat, render_command, write_output};
use cdi_manifests::{ConfigOverrides, FactoryConfiguration, ResourceFactory};

/// Generate the CDI controller ServiceAccount, Deployment and ConfigMap.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// YAML file with the factory configuration.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(flatten)]
    overrides: OverrideArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Per-field overrides. Each has an environment variable counterpart (named
/// in its help); flags win over the environment, which wins over the
/// configuration file.
#[derive(Args, Debug)]
struct OverrideArgs {
    /// Namespace CDI is installed into [env: CDI_NAMESPACE].
    #[arg(long, global = true)]
    namespace: Option<String>,

    /// Registry and organisation prefix of the CDI images [env: DOCKER_REPO].
    #[arg(long, global = true)]
    image_repository: Option<String>,

    /// Controller image name [env: CONTROLLER_IMAGE].
    #[arg(long, global = true)]
    controller_image: Option<String>,

    /// Importer image name [env: IMPORTER_IMAGE].
    #[arg(long, global = true)]
    importer_image: Option<String>,

    /// Cloner image name [env: CLONER_IMAGE].
    #[arg(long, global = true)]
    cloner_image: Option<String>,

    /// Upload server image name [env: UPLOADSERVER_IMAGE].
    #[arg(long, global = true)]
    upload_server_image: Option<String>,

    /// Tag shared by all CDI images [env: DOCKER_TAG].
    #[arg(long, global = true)]
    image_tag: Option<String>,

    /// Controller log verbosity [env: VERBOSITY].
    #[arg(long, global = true)]
    verbosity: Option<String>,

    /// Always, IfNotPresent or Never [env: PULL_POLICY].
    #[arg(long, global = true)]
    pull_policy: Option<String>,
}

impl From<OverrideArgs> for ConfigOverrides {
    fn from(args: OverrideArgs) -> Self {
        ConfigOverrides {
            namespace: args.namespace,
            image_repository: args.image_repository,
            controller_image_name: args.controller_image,
            importer_image_name: args.importer_image,
            cloner_image_name: args.cloner_image,
            upload_server_image_name: args.upload_server_image,
            image_tag: args.image_tag,
            log_verbosity: args.verbosity,
            image_pull_policy: args.pull_policy,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the namespaced controller resources.
    Render {
        /// yaml or json.
        #[arg(long, default_value_t = OutputFormat::Yaml)]
        format: OutputFormat,

        /// Append the Prometheus metrics Service.
        #[arg(long)]
        with_metrics_service: bool,

        /// Pass the configuration through without validating it.
        #[arg(long)]
        skip_validation: bool,
    },
    /// Print the service account user names that need elevated permissions.
    PrivilegedAccounts,
    /// Print the JSON schema of the configuration file.
    Schema,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("cdi_manifests=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(cli: Cli) -> cdi_manifests::Result<()> {
    let Cli {
        config,
        overrides,
        command,
        ..
    } = cli;
    let factory = ResourceFactory::default();
    let mut stdout = std::io::stdout().lock();

    match command {
        Commands::Render {
            format,
            with_metrics_service,
            skip_validation,
        } => {
            let config = load_config(
                config.as_deref(),
                ConfigOverrides::from_env(),
                overrides.into(),
            )?;
            let rendered = render_command(
                &factory,
                &config,
                format,
                with_metrics_service,
                skip_validation,
            )?;
            write_output(&mut stdout, &rendered)?;
        }
        Commands::PrivilegedAccounts => {
            let config = load_config(
                config.as_deref(),
                ConfigOverrides::from_env(),
                overrides.into(),
            )?;
            let mut out = String::new();
            for account in factory.privileged_service_account_names(&config) {
                out.push_str(&account);
                out.push('\n');
            }
            write_output(&mut stdout, &out)?;
        }
        Commands::Schema => {
            let schema = schemars::schema_for!(FactoryConfiguration);
            let mut out = serde_json::to_string_pretty(&schema)?;
            out.push('\n');
            write_output(&mut stdout, &out)?;
        }
    }

    Ok(())
}
