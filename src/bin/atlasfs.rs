//! AtlasFS CLI
//!
//! Command-line access to a durable AtlasFS store.

use std::fs::File;
use std::io::{self, Read, Write};
use std::process;

use atlasfs::{Config, FileSystem, Result, TreeDb};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

/// AtlasFS CLI
#[derive(Parser, Debug)]
#[command(name = "atlasfs")]
#[command(about = "Hierarchical file store inside an embedded key-value store")]
#[command(version)]
struct Args {
    /// Data directory
    #[arg(short, long, default_value = "./atlasfs_data")]
    data_dir: String,

    /// Block size in bytes for newly written files
    #[arg(short, long, default_value = "32768")]
    block_size: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Copy a local file into the store
    Put {
        /// Local file to read
        source: String,

        /// Destination path inside the store
        dest: String,
    },

    /// Write a stored file to stdout
    Cat {
        /// Path inside the store
        path: String,
    },

    /// List a directory
    Ls {
        /// Directory path inside the store
        #[arg(default_value = "/")]
        path: String,
    },

    /// Show a file's metadata
    Stat {
        /// Path inside the store
        path: String,
    },
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,atlasfs=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();

    tracing::debug!("AtlasFS v{}", atlasfs::VERSION);
    tracing::debug!("Data directory: {}", args.data_dir);

    let config = Config::builder()
        .data_dir(&args.data_dir)
        .block_size(args.block_size)
        .build();

    if let Err(e) = run(&config, args.command) {
        tracing::error!("{}", e);
        process::exit(1);
    }
}

fn run(config: &Config, command: Commands) -> Result<()> {
    let db = TreeDb::open(config)?;
    let fs = FileSystem::mount(db.clone(), config)?;

    match command {
        Commands::Put { source, dest } => {
            let mut input = File::open(&source)?;
            let mut file = fs.create(&dest)?;
            let mut buf = vec![0u8; 64 * 1024];
            loop {
                let n = input.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                file.write_all(&buf[..n])?;
            }
            file.close()?;
            tracing::info!("{} -> {} ({} bytes)", source, dest, file.len());
        }
        Commands::Cat { path } => {
            let mut file = fs.open(&path)?;
            let mut stdout = io::stdout().lock();
            io::copy(&mut file, &mut stdout)?;
            stdout.flush()?;
            file.close()?;
        }
        Commands::Ls { path } => {
            let mut dir = fs.open(&path)?;
            for entry in dir.read_dir(0)? {
                let marker = if entry.is_dir { "/" } else { "" };
                println!("{:>12}  {}{}", entry.size(), entry.name, marker);
            }
            dir.close()?;
        }
        Commands::Stat { path } => {
            let mut file = fs.open(&path)?;
            let stat = file.stat();
            println!("name:       {}", stat.name);
            println!("directory:  {}", stat.is_dir);
            println!("size:       {}", stat.size());
            if let Some(inode) = &stat.inode {
                println!("block size: {}", stat.block_size);
                println!("inode:      {}", inode);
                println!("modified:   {} ms since epoch", stat.modified_ms);
            }
            file.close()?;
        }
    }

    db.sync()
}
