mod commands;
mod error;

use std::path::PathBuf;

use structopt::clap::AppSettings::*;
use structopt::StructOpt;
use tracing_subscriber::EnvFilter;

#[derive(Debug, StructOpt)]
enum Commands {
    #[structopt(
        name = "split",
        about = "Split a package into its verbatim header and its decompressed payload"
    )]
    Split {
        #[structopt(name = "in_rpm_file", parse(from_os_str), help = "Path to the package")]
        package: PathBuf,

        #[structopt(
            name = "out_header",
            parse(from_os_str),
            help = "Where to write the lead, signature and header"
        )]
        header: PathBuf,

        #[structopt(
            name = "out_payload",
            parse(from_os_str),
            help = "Where to write the decompressed payload"
        )]
        payload: PathBuf,
    },

    #[structopt(
        name = "join",
        about = "Join a header and a payload back into a package"
    )]
    Join {
        #[structopt(
            name = "in_header",
            parse(from_os_str),
            help = "Header file written by `split`"
        )]
        header: PathBuf,

        #[structopt(
            name = "in_payload",
            parse(from_os_str),
            help = "Uncompressed payload to embed"
        )]
        payload: PathBuf,

        #[structopt(
            name = "out_rpm_file",
            parse(from_os_str),
            help = "Where to write the package"
        )]
        package: PathBuf,
    },

    #[structopt(
        name = "blob",
        about = "Concatenate the regular, non-config files of a package into a delta source blob"
    )]
    Blob {
        #[structopt(name = "in_rpm_file", parse(from_os_str), help = "Path to the package")]
        package: PathBuf,

        #[structopt(
            name = "out_blob",
            parse(from_os_str),
            help = "Where to write the concatenated file contents"
        )]
        blob: PathBuf,
    },

    #[structopt(
        name = "info",
        visible_alias = "i",
        about = "Show the payload fields of a package or header file"
    )]
    Info {
        #[structopt(
            name = "rpm_or_header",
            parse(from_os_str),
            help = "Path to a package or a header file"
        )]
        path: PathBuf,
    },
}

#[derive(Debug, StructOpt)]
#[structopt(
    name = "rpmsplit",
    about = "Split RPM packages into header and payload, join them back together, and build delta source blobs.",
    settings = &[SubcommandRequiredElseHelp, DisableHelpSubcommand, VersionlessSubcommands]
)]
struct CliOpts {
    #[structopt(short, long, help = "Show verbose output", global = true)]
    verbose: bool,

    #[structopt(subcommand)]
    cmd: Commands,
}

fn main() {
    let opts = CliOpts::from_iter(wild::args_os());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if opts.verbose { "debug" } else { "warn" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    tracing::debug!(?opts, "parsed options");

    let result = match opts.cmd {
        Commands::Split {
            package,
            header,
            payload,
        } => commands::split(package, header, payload, opts.verbose),
        Commands::Join {
            header,
            payload,
            package,
        } => commands::join(header, payload, package, opts.verbose),
        Commands::Blob { package, blob } => commands::blob(package, blob, opts.verbose),
        Commands::Info { path } => commands::info(path),
    };

    if let Err(e) = result {
        eprintln!("{}", error::report(&e));
        std::process::exit(1);
    }
}
