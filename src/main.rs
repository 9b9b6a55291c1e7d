//! pith CLI: distill a saved HTML page into reader output.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use pith::{MockLabeler, Outcome, parse_page, segment};

#[derive(Parser)]
#[command(name = "pith", version, about = "Extract the readable core of a web page")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full pipeline (with the offline labeler) and print the result
    /// as JSON.
    Parse {
        /// Path to a saved HTML file
        input: PathBuf,
        /// Original page url, used for link resolution and rule matching
        #[arg(long, default_value = "https://example.com/")]
        url: String,
        /// Print the reader HTML instead of JSON
        #[arg(long)]
        html: bool,
    },
    /// Run only the segmentation stage and print the sentences.
    Segment {
        input: PathBuf,
        #[arg(long, default_value = "https://example.com/")]
        url: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Command::Parse { input, url, html } => {
            let raw = std::fs::read(&input)?;
            let content = pith::doc::decode_html_bytes(&raw);
            match parse_page(&content, &url, None, &MockLabeler)? {
                Outcome::Article(article) => {
                    if html {
                        println!("{}", article.html);
                    } else {
                        let out = serde_json::json!({
                            "meta": article.meta,
                            "text": article.text,
                            "images": article.images,
                        });
                        println!("{}", serde_json::to_string_pretty(&out)?);
                    }
                }
                Outcome::Worthless(kind) => {
                    eprintln!("page carries no usable content: {kind:?}");
                }
            }
        }
        Command::Segment { input, url } => {
            let raw = std::fs::read(&input)?;
            let content = pith::doc::decode_html_bytes(&raw);
            let segmented = segment(&content, &url, None)?;
            for sentence in &segmented.sentences {
                println!("[{}] {}", sentence.segment_id, sentence.text);
            }
        }
    }
    Ok(())
}
