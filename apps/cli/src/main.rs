use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use novelshelf_collection::{Collection, NodeId, NodeKind, NodePosition, ProjectInfo};

#[derive(Parser)]
#[command(
    name = "novelshelf-cli",
    about = "Inspect and edit NovelShelf collection files",
    author,
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 建立新的空收藏檔。 / Create a new, empty collection file.
    New(NewArgs),
    /// 列出收藏的樹狀內容。 / List the collection tree.
    Show(ShowArgs),
    /// 將一個專案檔加入收藏。 / Add a project file to the collection as a book.
    AddBook(AddBookArgs),
    /// 建立一個新系列。 / Create a new series.
    AddSeries(AddSeriesArgs),
    /// 移除書籍或系列。 / Remove a book or a series.
    Remove(RemoveArgs),
    /// 移動節點到其他位置。 / Move a node to another position.
    Move(MoveArgs),
    /// 編輯標題或描述。 / Edit a node's title or description.
    Set(SetArgs),
}

#[derive(Args)]
struct NewArgs {
    /// 收藏檔路徑（必須以 .nvcx 結尾）。 / Collection file path (must end in .nvcx).
    #[arg(value_name = "FILE")]
    file: PathBuf,
}

#[derive(Args)]
struct ShowArgs {
    /// 收藏檔路徑。 / Collection file path.
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// 一併列出描述段落。 / Include description paragraphs in the listing.
    #[arg(long)]
    descriptions: bool,
}

#[derive(Args)]
struct AddBookArgs {
    /// 收藏檔路徑。 / Collection file path.
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// 要加入的專案檔。 / Project file to add.
    #[arg(value_name = "PROJECT")]
    project: PathBuf,

    /// 書籍標題；預設為專案檔名。 / Book title; defaults to the project file stem.
    #[arg(long, value_name = "TEXT")]
    title: Option<String>,

    /// 書籍描述。 / Book description.
    #[arg(long, value_name = "TEXT")]
    desc: Option<String>,

    /// 加入指定系列（例如 sr1）。 / Add inside the given series (e.g. sr1).
    #[arg(long, value_name = "ID")]
    series: Option<String>,
}

#[derive(Args)]
struct AddSeriesArgs {
    /// 收藏檔路徑。 / Collection file path.
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// 系列標題。 / Series title.
    #[arg(value_name = "TITLE")]
    title: String,
}

#[derive(Args)]
struct RemoveArgs {
    /// 收藏檔路徑。 / Collection file path.
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// 要移除的節點（bk… 或 sr…）。 / Node to remove (bk… or sr…).
    #[arg(value_name = "ID")]
    id: String,

    /// 移除系列時連同其書籍一併刪除。 / When removing a series, delete its books too.
    #[arg(long)]
    with_books: bool,
}

#[derive(Args)]
struct MoveArgs {
    /// 收藏檔路徑。 / Collection file path.
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// 要移動的節點。 / Node to move.
    #[arg(value_name = "ID")]
    id: String,

    /// 目標系列；省略時移到頂層。 / Target series; top level when omitted.
    #[arg(long, value_name = "ID")]
    series: Option<String>,

    /// 目標位置；省略時放到最後。 / Target index; appended when omitted.
    #[arg(long, value_name = "N")]
    index: Option<usize>,
}

#[derive(Args)]
struct SetArgs {
    /// 收藏檔路徑。 / Collection file path.
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// 要編輯的節點。 / Node to edit.
    #[arg(value_name = "ID")]
    id: String,

    /// 新標題。 / New title.
    #[arg(long, value_name = "TEXT")]
    title: Option<String>,

    /// 新描述；以 \n 分段。 / New description; paragraphs split on \n.
    #[arg(long, value_name = "TEXT")]
    desc: Option<String>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    match Cli::parse().command {
        Commands::New(args) => execute_new(args),
        Commands::Show(args) => execute_show(args),
        Commands::AddBook(args) => execute_add_book(args),
        Commands::AddSeries(args) => execute_add_series(args),
        Commands::Remove(args) => execute_remove(args),
        Commands::Move(args) => execute_move(args),
        Commands::Set(args) => execute_set(args),
    }
}

fn execute_new(args: NewArgs) -> Result<()> {
    if args.file.exists() {
        bail!("'{}' already exists", args.file.display());
    }
    let mut collection = Collection::new(&args.file)?;
    let message = collection.write()?;
    println!("{message}");
    Ok(())
}

fn execute_show(args: ShowArgs) -> Result<()> {
    let collection = open_collection(&args.file)?;
    println!(
        "Collection \"{}\" ({} books)",
        collection.title(),
        collection.book_count()
    );
    for id in collection.tree().children(None) {
        print_node(&collection, id, 0, args.descriptions);
        for child in collection.tree().children(Some(id)) {
            print_node(&collection, child, 1, args.descriptions);
        }
    }
    Ok(())
}

fn execute_add_book(args: AddBookArgs) -> Result<()> {
    let mut collection = open_collection(&args.file)?;
    let title = match args.title {
        Some(title) => title,
        None => args
            .project
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .to_string(),
    };
    let project = ProjectInfo {
        file_path: Some(args.project.clone()),
        title,
        desc: args.desc.unwrap_or_default(),
    };
    let parent = args.series.map(parse_series_id).transpose()?;
    let added = collection.add_book(&project, parent.as_ref(), NodePosition::End)?;
    let Some(id) = added else {
        bail!(
            "book already exists in the collection: '{}'",
            args.project.display()
        );
    };
    collection.write()?;
    println!("Book added to the collection: \"{}\" ({id}).", project.title);
    Ok(())
}

fn execute_add_series(args: AddSeriesArgs) -> Result<()> {
    let mut collection = open_collection(&args.file)?;
    let id = collection.add_series(&args.title, NodePosition::End)?;
    collection.write()?;
    println!("Series added to the collection: \"{}\" ({id}).", args.title);
    Ok(())
}

fn execute_remove(args: RemoveArgs) -> Result<()> {
    let mut collection = open_collection(&args.file)?;
    let id = NodeId::new(&args.id);
    let message = match id.kind() {
        Some(NodeKind::Book) => collection.remove_book(&id)?,
        Some(NodeKind::Series) if args.with_books => collection.remove_series_with_books(&id)?,
        Some(NodeKind::Series) => collection.remove_series(&id)?,
        None => bail!("unknown node id '{}'", args.id),
    };
    collection.write()?;
    println!("{message}");
    Ok(())
}

fn execute_move(args: MoveArgs) -> Result<()> {
    let mut collection = open_collection(&args.file)?;
    let id = NodeId::new(&args.id);
    let parent = args.series.map(parse_series_id).transpose()?;
    let position = match args.index {
        Some(index) => NodePosition::At(index),
        None => NodePosition::End,
    };
    collection.move_node(&id, parent.as_ref(), position)?;
    collection.write()?;
    println!("Moved {id}.");
    Ok(())
}

fn execute_set(args: SetArgs) -> Result<()> {
    if args.title.is_none() && args.desc.is_none() {
        bail!("nothing to change; pass --title and/or --desc");
    }
    let mut collection = open_collection(&args.file)?;
    let id = NodeId::new(&args.id);
    if let Some(title) = &args.title {
        collection.set_title(&id, title)?;
    }
    if let Some(desc) = &args.desc {
        collection.set_description(&id, desc)?;
    }
    collection.write()?;
    println!("Updated {id}.");
    Ok(())
}

fn open_collection(path: &Path) -> Result<Collection> {
    let mut collection = Collection::new(path)?;
    // the engine's messages already name the file, so no extra context
    collection.read()?;
    Ok(collection)
}

fn parse_series_id(raw: String) -> Result<NodeId> {
    let id = NodeId::new(raw);
    if id.kind() != Some(NodeKind::Series) {
        bail!("'{id}' is not a series id");
    }
    Ok(id)
}

fn print_node(collection: &Collection, id: &NodeId, level: usize, descriptions: bool) {
    let indent = "  ".repeat(level);
    if let Some(book) = collection.book(id) {
        println!(
            "{indent}{id}  {}  [{}]",
            book.title,
            book.file_path().display()
        );
        if descriptions {
            print_desc(&book.desc, level + 1);
        }
    } else if let Some(series) = collection.series(id) {
        println!("{indent}{id}  {}", series.title);
        if descriptions {
            print_desc(&series.desc, level + 1);
        }
    }
}

fn print_desc(desc: &str, level: usize) {
    let indent = "  ".repeat(level);
    for paragraph in desc.split('\n').filter(|paragraph| !paragraph.is_empty()) {
        println!("{indent}{paragraph}");
    }
}
