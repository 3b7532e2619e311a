//! hearth-vfsctl: inspect and edit a local hearth file tree.
//!
//! Runs directly against the on-disk stores, so it should not be pointed at
//! a data directory a server is using at the same time.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use hearth_vfs::vpath;
use hearth_vfs::{DirDoc, DocPatch, FileDoc, Node, Vfs, VfsConfig};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_MIME: &str = "application/octet-stream";

#[derive(Parser, Debug)]
#[command(name = "hearth-vfsctl", about = "Inspect and edit a local hearth file tree")]
struct Args {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides the config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the data directory with an empty tree
    Init,
    /// Copy a local file into the tree
    Put {
        local: PathBuf,
        path: String,
        #[arg(long, default_value = DEFAULT_MIME)]
        mime: String,
        #[arg(long)]
        executable: bool,
        /// Replace the content if the file already exists
        #[arg(long)]
        replace: bool,
    },
    /// Print a file's content
    Cat { path: String },
    /// List a directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Print the metadata document of a file or directory as JSON
    Stat { path: String },
    /// Create a directory
    Mkdir { path: String },
    /// Move or rename a file or directory
    Mv { from: String, to: String },
    /// Move a file or directory to the trash
    Trash { path: String },
    /// Put a trashed file or directory back where it came from
    Restore { path: String },
    /// Delete a file or directory for good
    Rm { path: String },
}

enum Target {
    File(FileDoc),
    Dir(DirDoc),
}

async fn lookup(vfs: &Vfs, path: &str) -> Result<Target> {
    match vfs.get_file_doc_from_path(path).await {
        Ok(doc) => return Ok(Target::File(doc)),
        Err(e) if e.is_not_found() => {}
        Err(e) => return Err(e.into()),
    }
    let dir = vfs
        .get_dir_doc_from_path(path)
        .await
        .with_context(|| format!("{path}: no such file or directory"))?;
    Ok(Target::Dir(dir))
}

fn load_config(args: &Args) -> Result<VfsConfig> {
    let mut config = match &args.config {
        Some(path) => VfsConfig::load(path)?,
        None => VfsConfig::default(),
    };
    if let Some(dir) = &args.data_dir {
        config.data_dir = Some(dir.clone());
    }
    Ok(config)
}

fn data_dir(config: &VfsConfig) -> Result<PathBuf> {
    if let Some(dir) = &config.data_dir {
        return Ok(dir.clone());
    }
    let base = dirs::data_local_dir().context("no local data directory; pass --data-dir")?;
    Ok(base.join("hearth"))
}

async fn put(
    vfs: &Vfs,
    local: &Path,
    path: &str,
    mime: String,
    executable: bool,
    replace: bool,
) -> Result<FileDoc> {
    let body = tokio::fs::read(local)
        .await
        .with_context(|| format!("reading {}", local.display()))?;
    let parent = vfs.get_dir_doc_from_path(&vpath::dir(path)).await?;
    let class = mime.split('/').next().unwrap_or_default().to_string();
    let newdoc = FileDoc::new(
        vpath::base(path),
        parent.id.clone(),
        body.len() as i64,
        None,
        mime,
        class,
        Utc::now(),
        executable,
        vec![],
    )?;

    let mut existing = match vfs.get_file_doc_from_path(path).await {
        Ok(doc) if replace => Some(doc),
        Ok(_) => bail!("{path} already exists; pass --replace to overwrite it"),
        Err(e) if e.is_not_found() => None,
        Err(e) => return Err(e.into()),
    };

    let mut file = vfs.create_file(newdoc, existing.as_mut()).await?;
    file.write_all(&body).await?;
    let stored = file
        .close()
        .await?
        .context("write handle returned no document")?;
    Ok(stored)
}

async fn move_to(vfs: &Vfs, from: &str, to: &str) -> Result<()> {
    let parent = vfs.get_dir_doc_from_path(&vpath::dir(to)).await?;
    let patch = DocPatch::new()
        .name(vpath::base(to))
        .dir_id(parent.id.clone());
    match lookup(vfs, from).await? {
        Target::File(mut doc) => {
            vfs.modify_file_metadata(&mut doc, patch).await?;
        }
        Target::Dir(doc) => {
            vfs.modify_dir_metadata(&doc, patch).await?;
        }
    }
    Ok(())
}

async fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    let dir = data_dir(&config)?;
    let vfs = Vfs::open_local(&dir, config)
        .await
        .with_context(|| format!("opening {}", dir.display()))?;

    match args.command {
        Command::Init => {
            println!("initialized {}", dir.display());
        }
        Command::Put {
            local,
            path,
            mime,
            executable,
            replace,
        } => {
            let doc = put(&vfs, &local, &path, mime, executable, replace).await?;
            println!("{} {} bytes", doc.id, doc.size);
        }
        Command::Cat { path } => {
            let mut doc = vfs.get_file_doc_from_path(&path).await?;
            let mut file = vfs.open_file(&mut doc).await?;
            let body = file.read_to_end().await?;
            file.close().await?;
            use std::io::Write;
            std::io::stdout().write_all(&body)?;
        }
        Command::Ls { path } => {
            let dir = vfs.get_dir_doc_from_path(&path).await?;
            for child in vfs.list_children(&dir).await? {
                match child {
                    Node::Directory(d) => println!("d {:>12} {}/", "-", d.name),
                    Node::File(f) => println!("- {:>12} {}", f.size, f.name),
                }
            }
        }
        Command::Stat { path } => {
            let json = match lookup(&vfs, &path).await? {
                Target::File(doc) => serde_json::to_string_pretty(&doc)?,
                Target::Dir(doc) => serde_json::to_string_pretty(&doc)?,
            };
            println!("{json}");
        }
        Command::Mkdir { path } => {
            let parent = vfs.get_dir_doc_from_path(&vpath::dir(&path)).await?;
            let doc = DirDoc::new(vpath::base(&path), parent.id.clone(), Utc::now(), vec![])?;
            let created = vfs.create_dir(doc).await?;
            println!("{}", created.id);
        }
        Command::Mv { from, to } => move_to(&vfs, &from, &to).await?,
        Command::Trash { path } => {
            let trashed_name = match lookup(&vfs, &path).await? {
                Target::File(mut doc) => vfs.trash_file(&mut doc).await?.name,
                Target::Dir(doc) => vfs.trash_dir(&doc).await?.name,
            };
            println!("trashed as {trashed_name}");
        }
        Command::Restore { path } => {
            let restored = match lookup(&vfs, &path).await? {
                Target::File(mut doc) => vfs.restore_file(&mut doc).await?.path(&vfs).await?,
                Target::Dir(doc) => vfs.restore_dir(&doc).await?.path(&vfs).await?,
            };
            println!("restored to {restored}");
        }
        Command::Rm { path } => match lookup(&vfs, &path).await? {
            Target::File(mut doc) => vfs.destroy_file(&mut doc).await?,
            Target::Dir(doc) => vfs.destroy_dir(&doc).await?,
        },
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    tracing::debug!(command = ?args.command, "starting");
    run(args).await
}
