use anyhow::{bail, Context, Result};
use blocknet::generator::{save_network, write_network};
use blocknet::geometry::Grid;
use blocknet::model::{demo_network, Network, NetworkDoc};
use blocknet::parser::load_network;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about = "Block-diagram network tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Load a network and report every naming/endpoint violation
    Check {
        /// Network XML file
        #[arg(value_name = "FILE")]
        file: Utf8PathBuf,
    },
    /// Load a network and print it as pretty JSON
    Dump {
        /// Network XML or binary snapshot file
        #[arg(value_name = "FILE")]
        file: Utf8PathBuf,
    },
    /// Emit the built-in two-block demo network as XML
    Demo {
        /// Write to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<Utf8PathBuf>,
    },
    /// Convert between the XML format and the binary snapshot format,
    /// detected by file extension
    Convert {
        /// Input file (.xml or .bnet)
        #[arg(value_name = "INPUT")]
        input: Utf8PathBuf,
        /// Output file (.xml or .bnet)
        #[arg(value_name = "OUTPUT")]
        output: Utf8PathBuf,
    },
}

/// Loads either format, detected by extension: `.bnet` is the binary
/// snapshot, everything else is parsed as XML.
fn load_any(path: &Utf8PathBuf) -> Result<Network> {
    if path.extension() == Some("bnet") {
        let doc = NetworkDoc::load_from_binary(path.as_std_path())
            .with_context(|| format!("Failed to load snapshot {}", path))?;
        Ok(doc.network)
    } else {
        load_network(path)
    }
}

fn save_any(network: Network, path: &Utf8PathBuf) -> Result<()> {
    if path.extension() == Some("bnet") {
        NetworkDoc { network }
            .save_to_binary(path.as_std_path())
            .with_context(|| format!("Failed to write snapshot {}", path))
    } else {
        save_network(&network, path)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Check { file } => {
            let network = load_any(&file)?;
            let errors = network.check_names();
            for e in &errors {
                eprintln!("{}", e);
            }
            if !errors.is_empty() {
                bail!("{} problem(s) found in {}", errors.len(), file);
            }
            println!(
                "{}: {} blocks, {} connectors, no problems",
                file,
                network.blocks().count(),
                network.connectors().count()
            );
        }
        Command::Dump { file } => {
            let network = load_any(&file)?;
            println!("{}", serde_json::to_string_pretty(&network)?);
        }
        Command::Demo { output } => {
            let network = demo_network(&Grid::default());
            match output {
                Some(path) => save_network(&network, &path)?,
                None => print!("{}", write_network(&network)),
            }
        }
        Command::Convert { input, output } => {
            let network = load_any(&input)?;
            save_any(network, &output)?;
        }
    }
    Ok(())
}
