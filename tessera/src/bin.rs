use anyhow::Result;
use clap::{App, Arg};
use std::str::FromStr;
use tessera_core::gcs::GcsPath;
use tessera::Options;

#[tokio::main]
pub async fn main() -> Result<()> {

    let options = App::new("tessera")
        .version("1.0")
        .about("Tessera is a batch updater for a test-results dashboard. For each configured test group it walks the object store for recent builds, reads their start/finish markers and junit artifacts, and writes back one compressed grid of results per group. Refer to the README.md for more details.")
        .arg(Arg::with_name("config")
            .long("config")
            .help("The gs:// path of the dashboard configuration proto")
            .required(true)
            .takes_value(true))
        .arg(Arg::with_name("gcp-service-account")
            .long("gcp-service-account")
            .help("Path to a service-account credentials file. Leave unset to use ambient credentials")
            .takes_value(true))
        .arg(Arg::with_name("confirm")
            .long("confirm")
            .help("Actually upload the serialized grids. Without this flag the run is a dry-run"))
        .arg(Arg::with_name("test-group")
            .long("test-group")
            .help("Restrict the run to the named test group")
            .takes_value(true))
        .arg(Arg::with_name("group-concurrency")
            .long("group-concurrency")
            .help("Number of groups to update in parallel. Zero means four workers per CPU")
            .takes_value(true))
        .get_matches();

    dotenv::dotenv().ok();
    let _ = env_logger::try_init();

    let config = GcsPath::from_str(options.value_of("config").expect("no config specified"))?;

    let group_concurrency = match options.value_of("group-concurrency") {
        Some(value) => value.parse::<usize>()
            .map_err(|_| anyhow::anyhow!("--group-concurrency must be a number, got {}", value))?,
        None => 0,
    };

    tessera::run(Options {
        config,
        service_account: options.value_of("gcp-service-account")
            .filter(|path| !path.is_empty())
            .map(Into::into),
        confirm: options.is_present("confirm"),
        test_group: options.value_of("test-group").map(Into::into),
        group_concurrency,
    }).await?;

    Ok(())
}
