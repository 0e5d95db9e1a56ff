use anyhow::Context;
use futures::stream::{BoxStream, StreamExt};
use std::process::ExitCode;
use throwaway::cli::{Args, display_command};
use throwaway::container::{
    ContainerClient, ContainerError, ContainerOrchestrator, INTERRUPTED_EXIT_CODE,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    match run(args).await {
        Ok(code) => ExitCode::from(code),
        Err(e) if interrupted(&e) => {
            eprintln!("{}", e);
            ExitCode::from(INTERRUPTED_EXIT_CODE)
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn interrupted(e: &anyhow::Error) -> bool {
    matches!(
        e.downcast_ref::<ContainerError>(),
        Some(ContainerError::Interrupted)
    )
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "throwaway=debug"
    } else {
        "throwaway=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: Args) -> anyhow::Result<u8> {
    let settings = args
        .resolve_settings()
        .context("Failed to load configuration")?;

    if args.show_config {
        print!("{}", settings.to_toml_string()?);
        return Ok(0);
    }

    let config = settings.to_orchestrator_config()?;
    let command = args.command(&settings);
    println!("{}", display_command(&command));

    // Registered before anything is created; Ctrl-C is queued from here on
    let interrupts = interrupts().context("Failed to listen for Ctrl-C")?;

    let client = ContainerClient::new()
        .await
        .context("Failed to connect to the container runtime")?;
    let orchestrator = ContainerOrchestrator::new(client, config);

    let report = orchestrator
        .run(
            &command,
            interrupts,
            &mut std::io::stdout(),
            &mut std::io::stderr(),
        )
        .await?;

    info!(
        "Run finished: container {} removed, image removed: {}",
        report.container_id, report.image_removed
    );
    Ok(report.exit_code())
}

/// Every Ctrl-C received from now on, one item each.
#[cfg(unix)]
fn interrupts() -> std::io::Result<BoxStream<'static, ()>> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    Ok(futures::stream::poll_fn(move |cx| sigint.poll_recv(cx)).boxed())
}

/// Every Ctrl-C received from now on, one item each.
#[cfg(windows)]
fn interrupts() -> std::io::Result<BoxStream<'static, ()>> {
    let mut ctrl_c = tokio::signal::windows::ctrl_c()?;
    Ok(futures::stream::poll_fn(move |cx| ctrl_c.poll_recv(cx)).boxed())
}
