use clap::Parser;

use crate::openai::model::Model;

/// Terminal chat client with streamed function calling against a local tool server
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Model to chat with (overrides the config file)
    #[arg(short, long)]
    pub model: Option<Model>,

    /// Send a single prompt and exit instead of starting the interactive session
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Upload a file to the tool server and attach it to the first message
    #[arg(short, long)]
    pub upload: Option<String>,
}
