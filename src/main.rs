use clap::Parser;
use miette::{IntoDiagnostic, Result};
use purchase_coordinator::application::coordinator::BillingCoordinator;
use purchase_coordinator::infrastructure::channel_sink::ChannelEventSink;
use purchase_coordinator::interfaces::csv::command_reader::CommandReader;
use purchase_coordinator::interfaces::csv::event_writer::EventWriter;
use purchase_coordinator::interfaces::fixture::StoreFixture;
use purchase_coordinator::telemetry;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON description of the simulated store
    store: PathBuf,

    /// Command script CSV file
    script: PathBuf,

    /// Public key passed to provider setup. Overrides the store's config.
    #[arg(long)]
    public_key: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init();
    let cli = Cli::parse();

    let fixture = StoreFixture::from_reader(File::open(&cli.store).into_diagnostic()?).into_diagnostic()?;
    let (mut config, provider) = fixture.into_parts();
    if let Some(public_key) = cli.public_key {
        config.public_key = public_key;
    }
    let public_key = config.public_key.clone();

    let (sink, mut events) = ChannelEventSink::channel();
    let coordinator = BillingCoordinator::spawn(Arc::new(provider), Arc::new(sink), config);

    // Commands run one at a time, each waiting for its answer.
    let file = File::open(cli.script).into_diagnostic()?;
    let reader = CommandReader::new(file);
    for command in reader.commands() {
        match command {
            Ok(command) => {
                if let Err(e) = command.execute(&coordinator, &public_key).await {
                    error!(error = %e, "Error processing command");
                }
            }
            Err(e) => {
                error!(error = %e, "Error reading command");
            }
        }
    }

    let pending = coordinator.shutdown().await.into_diagnostic()?;
    info!(pending = pending.len(), "coordinator stopped");

    let mut emitted = Vec::new();
    while let Ok(event) = events.try_recv() {
        emitted.push(event);
    }

    let stdout = io::stdout();
    let mut writer = EventWriter::new(stdout.lock());
    writer.write_events(&emitted).into_diagnostic()?;

    Ok(())
}
