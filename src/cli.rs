use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "sb2-import",
    about = "Convert Scratch 2.0 projects (.sb2 or project.json) into Scratch 3.0 projects."
)]
pub struct Args {
    #[arg(value_name = "INPUT")]
    pub input: PathBuf,

    #[arg(
        value_name = "OUTPUT",
        help = "Output path. Defaults to INPUT with an .sb3 extension, or stdout with --json."
    )]
    pub output: Option<PathBuf>,

    #[arg(long, help = "Write the converted project.json instead of a packaged .sb3.")]
    pub json: bool,

    #[arg(
        long,
        value_name = "FILE",
        help = "JSON opcode table merged over the built-in legacy opcode table."
    )]
    pub spec_map: Option<PathBuf>,
}
