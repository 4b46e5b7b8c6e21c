// Headless driver: runs the tab manager against the in-memory surface and
// reads line commands from stdin. Useful for scripting and for poking at the
// lifecycle without a webview.
//
//   bifrost-shell [settings.json]
//
// Logs go to stderr (RUST_LOG, default info); command results go to stdout as JSON.

use std::path::Path;

use bifrost_shell_lib::modules::shortcuts::{Accelerator, KeyStroke};
use bifrost_shell_lib::state::GroupId;
use bifrost_shell_lib::{
    readiness, BuiltinView, Coordinator, DefaultLoader, MemorySurface, MountPoints, Settings, TabId,
};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const HELP: &str = "\
commands:
  new [address] [title...]     open a tab
  close <id> | close-active    close a tab
  activate <id> | next | prev  switch tabs
  view <history|settings|tabgroups>
  title <id> <title...>        retitle a tab
  address <id> <address>       re-target a tab
  reorder <id> <id>...         reorder the strip
  reopen                       reopen the last closed tab
  key <accelerator>            press a shortcut, e.g. key Ctrl+Shift+T
  group <name...>              save the live tabs as a group
  open-group <id>              replace the live tabs with a group
  groups | filter <query>      list groups or search their tabs
  width <px|none>              resize the tab strip
  list | strip                 show tabs or the rendered strip
  help | quit";

#[derive(Debug, PartialEq)]
enum Command {
    New { address: Option<String>, title: Option<String> },
    Close(TabId),
    CloseActive,
    Activate(TabId),
    Next,
    Prev,
    View(BuiltinView),
    Title(TabId, String),
    Address(TabId, String),
    Reorder(Vec<TabId>),
    Reopen,
    Key(KeyStroke),
    Group(String),
    OpenGroup(GroupId),
    Groups,
    Filter(String),
    Width(Option<f64>),
    List,
    Strip,
    Help,
    Quit,
}

fn rest(words: &[&str]) -> Option<String> {
    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

fn tab_id(words: &[&str]) -> Result<TabId, String> {
    words
        .first()
        .map(|id| TabId::from(*id))
        .ok_or_else(|| "missing tab id".to_string())
}

/// Accelerators press CmdOrCtrl as Ctrl.
fn stroke_for(accelerator: &str) -> Result<KeyStroke, String> {
    let acc = Accelerator::parse(accelerator).map_err(|e| e.to_string())?;
    Ok(KeyStroke {
        key: acc.key,
        ctrl: acc.modifiers.ctrl || acc.modifiers.cmd_or_ctrl,
        alt: acc.modifiers.alt,
        shift: acc.modifiers.shift,
        meta: acc.modifiers.meta,
    })
}

fn parse_command(line: &str) -> Result<Command, String> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let Some((&name, args)) = words.split_first() else {
        return Err("empty command".to_string());
    };

    let command = match name {
        "new" => Command::New {
            address: args.first().map(|a| a.to_string()),
            title: rest(args.get(1..).unwrap_or_default()),
        },
        "close" => Command::Close(tab_id(args)?),
        "close-active" => Command::CloseActive,
        "activate" => Command::Activate(tab_id(args)?),
        "next" => Command::Next,
        "prev" => Command::Prev,
        "view" => Command::View(args.first().ok_or("missing view kind")?.parse()?),
        "title" => Command::Title(tab_id(args)?, rest(&args[1..]).unwrap_or_default()),
        "address" => Command::Address(
            tab_id(args)?,
            args.get(1).map(|a| a.to_string()).unwrap_or_default(),
        ),
        "reorder" => Command::Reorder(args.iter().map(|id| TabId::from(*id)).collect()),
        "reopen" => Command::Reopen,
        "key" => Command::Key(stroke_for(args.first().ok_or("missing accelerator")?)?),
        "group" => Command::Group(rest(args).ok_or("missing group name")?),
        "open-group" => {
            let id = args
                .first()
                .ok_or("missing group id")?
                .parse::<u64>()
                .map_err(|e| e.to_string())?;
            Command::OpenGroup(GroupId(id))
        }
        "groups" => Command::Groups,
        "filter" => Command::Filter(rest(args).unwrap_or_default()),
        "width" => match args.first() {
            None | Some(&"none") => Command::Width(None),
            Some(px) => Command::Width(Some(px.parse::<f64>().map_err(|e| e.to_string())?)),
        },
        "list" => Command::List,
        "strip" => Command::Strip,
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(format!("unknown command: {}", other)),
    };
    Ok(command)
}

async fn execute(coordinator: &Coordinator, surface: &MemorySurface, command: Command) -> Result<Value, String> {
    let to_json = |v: Result<Value, serde_json::Error>| v.map_err(|e| e.to_string());
    let value = match command {
        Command::New { address, title } => {
            json!(coordinator
                .create_tab(address.as_deref(), title.as_deref())
                .map_err(|e| e.to_string())?)
        }
        Command::Close(id) => {
            coordinator.close_tab(&id).map_err(|e| e.to_string())?;
            Value::Null
        }
        Command::CloseActive => json!(coordinator.close_active_tab().map_err(|e| e.to_string())?),
        Command::Activate(id) => {
            coordinator.activate_tab(&id).map_err(|e| e.to_string())?;
            Value::Null
        }
        Command::Next => json!(coordinator.next_tab().map_err(|e| e.to_string())?),
        Command::Prev => json!(coordinator.prev_tab().map_err(|e| e.to_string())?),
        Command::View(view) => json!(coordinator.open_builtin_view(view).map_err(|e| e.to_string())?),
        Command::Title(id, title) => {
            coordinator.update_tab_title(&id, &title).map_err(|e| e.to_string())?;
            Value::Null
        }
        Command::Address(id, address) => {
            coordinator.update_tab_address(&id, &address).map_err(|e| e.to_string())?;
            Value::Null
        }
        Command::Reorder(order) => json!(coordinator.reorder_tabs(&order).map_err(|e| e.to_string())?),
        Command::Reopen => json!(coordinator.reopen_closed_tab().map_err(|e| e.to_string())?),
        Command::Key(stroke) => json!(coordinator.handle_key(&stroke).map_err(|e| e.to_string())?),
        Command::Group(name) => json!(coordinator.create_tab_group(&name).map_err(|e| e.to_string())?),
        Command::OpenGroup(id) => json!(coordinator.open_tab_group(id).map_err(|e| e.to_string())?),
        Command::Groups => to_json(serde_json::to_value(coordinator.groups()))?,
        Command::Filter(query) => to_json(serde_json::to_value(coordinator.filter_group_tabs(&query)))?,
        Command::Width(width) => {
            surface.set_width(width);
            to_json(serde_json::to_value(coordinator.render_strip().map_err(|e| e.to_string())?))?
        }
        Command::List => to_json(serde_json::to_value(coordinator.tabs()))?,
        Command::Strip => to_json(serde_json::to_value(surface.strip()))?,
        Command::Help => Value::String(HELP.to_string()),
        Command::Quit => Value::Null,
    };
    // Let fetches started by the command land before the next prompt.
    coordinator.settle().await;
    Ok(value)
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    let settings = match std::env::args().nth(1) {
        Some(path) => Settings::load(Path::new(&path)),
        None => Settings::default(),
    };

    let surface = MemorySurface::new(Some(1280.0));
    let loader = DefaultLoader::from_settings(&settings);
    let coordinator = Coordinator::new(settings, loader, Box::new(surface.clone()));

    let (signal, host) = readiness();
    signal.ready(MountPoints::default());
    coordinator.initialize(host).await?;
    coordinator.settle().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line) {
            Ok(Command::Quit) => break,
            Ok(command) => match execute(&coordinator, &surface, command).await {
                Ok(Value::Null) => println!("ok"),
                Ok(Value::String(text)) => println!("{}", text),
                Ok(value) => println!("{}", value),
                Err(e) => println!("error: {}", e),
            },
            Err(e) => println!("error: {}", e),
        }
    }

    log::info!("[Lifecycle] Shutting down with {} tabs", coordinator.tabs().len());
    Ok(())
}
