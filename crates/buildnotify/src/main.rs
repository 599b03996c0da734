use clap::Parser;
use owo_colors::OwoColorize;
use tokio::runtime::Builder;
use tracing_subscriber::{fmt, EnvFilter};

use buildnotify::cli::Cli;
use buildnotify::config::{FileConfig, Settings};
use buildnotify::notifier::Notifier;
use buildnotify::run::{build_request, deliver, lookup_from_settings, prepare, DeliveryReport};

use tabled::settings::{object::Columns, Modify, Style, Width};
use tabled::{Table, Tabled};

/// Exit code when at least one channel could not be delivered.
const EXIT_DELIVERY_FAILED: i32 = 3;

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "buildnotify=info",
        1 => "buildnotify=debug",
        _ => "buildnotify=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    println!("{}", serde_json::to_string_pretty(&cli.redacted()?)?);

    let file = FileConfig::load(cli.config.clone())?;
    let settings = Settings::resolve(&cli, file);

    let rt = Builder::new_current_thread().enable_all().build()?;
    let report = rt.block_on(async {
        let lookup = lookup_from_settings(&settings)?;
        let prepared = prepare(&settings.pipeline, lookup.as_ref()).await?;
        println!("{}", serde_json::to_string_pretty(&prepared.info)?);

        let notifier = Notifier::new(settings.notifier.clone())?;
        let request = build_request(notifier.config(), &prepared);
        Ok::<_, anyhow::Error>(deliver(&notifier, &request).await)
    })?;

    print_report(&report);

    if !report.all_delivered() {
        std::process::exit(EXIT_DELIVERY_FAILED);
    }
    Ok(())
}

fn print_report(report: &DeliveryReport) {
    #[derive(Tabled)]
    struct Row {
        #[tabled(rename = "channel")]
        channel: &'static str,
        #[tabled(rename = "status")]
        status: &'static str,
        #[tabled(rename = "response")]
        response: String,
    }

    let user = match &report.user {
        Ok(map) => ("delivered", serde_json::Value::Object(map.clone()).to_string()),
        Err(e) => ("failed", e.to_string()),
    };
    let group = match &report.group {
        Ok(body) => ("delivered", body.clone()),
        Err(e) => ("failed", e.to_string()),
    };
    let rows = vec![
        Row {
            channel: "user push",
            status: user.0,
            response: user.1,
        },
        Row {
            channel: "group webhook",
            status: group.0,
            response: group.1,
        },
    ];

    let mut table = Table::new(rows);
    table
        .with(Style::modern())
        .with(Modify::new(Columns::single(2)).with(Width::wrap(80)));
    println!("{}", table);

    if report.all_delivered() {
        println!("{}", "✅ notification delivered to both channels".green());
    } else {
        println!("{}", "🚨 notification delivery failed".red());
    }
}
