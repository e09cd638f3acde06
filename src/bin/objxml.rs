//! Convert JSON documents to object markup.
//!
//! ```bash
//! # One document, expanded two levels deep
//! objxml --depth 2 input.json
//!
//! # Every element of a top-level array as its own root element
//! echo '[1, {"a": true}]' | objxml --as stream --indent 2
//! ```

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{debug, info};
use objxml::primitives::KnownTypes;
use objxml::value::Object;
use objxml::writer::XmlWriter;
use objxml::{Layout, SerializationPolicy, Session, StopHandle, Value};

use std::fs;
use std::io::{self, BufWriter, Read, Write};
use std::path::PathBuf;

/// Type name given to JSON objects.
const JSON_OBJECT_TYPE: &str = "PSCustomObject";

#[derive(Parser)]
#[command(name = "objxml")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Serialize JSON values as depth-bounded object markup")]
struct Cli {
    /// Input file (reads stdin when absent or -)
    input: Option<PathBuf>,

    /// How many levels of properties to expand
    #[arg(short, long, default_value_t = SerializationPolicy::DEFAULT_DEPTH)]
    depth: usize,

    /// Leave out Type attributes
    #[arg(long)]
    no_type_information: bool,

    /// Output layout
    #[arg(long = "as", value_enum, default_value = "document")]
    layout: LayoutArg,

    /// Indent nested elements by this many spaces
    #[arg(long, value_name = "WIDTH")]
    indent: Option<usize>,

    /// Use System.* type names and True/False booleans
    #[arg(long)]
    dotnet_type_names: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LayoutArg {
    Document,
    Stream,
}

impl From<LayoutArg> for Layout {
    fn from(arg: LayoutArg) -> Self {
        match arg {
            LayoutArg::Document => Layout::Document,
            LayoutArg::Stream => Layout::Stream,
        }
    }
}

fn main() -> Result<()> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let policy = build_policy(&cli)?;
    let input = read_input(cli.input.as_ref())?;
    let json: serde_json::Value = serde_json::from_str(&input).context("input is not valid JSON")?;
    let items = top_level_items(&json);
    debug!("{} top-level items", items.len());

    let stop = StopHandle::new();
    ctrlc_handler(stop.clone());

    let stdout = io::stdout();
    let out = BufWriter::new(stdout.lock());
    let mut writer = match cli.indent {
        Some(width) => XmlWriter::indented(out, width),
        None => XmlWriter::new(out),
    };
    let layout = Layout::from(cli.layout);
    if layout == Layout::Document {
        writer.write_declaration()?;
    }

    let mut session = Session::with_layout(writer, policy, layout)?.with_stop_handle(stop);
    for (index, item) in items.iter().enumerate() {
        session
            .serialize(item)
            .with_context(|| format!("failed to serialize item {}", index + 1))?;
    }
    let mut out = session.done()?.into_inner();
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

fn build_policy(cli: &Cli) -> Result<SerializationPolicy> {
    let known_types = if cli.dotnet_type_names {
        KnownTypes::dotnet()
    } else {
        KnownTypes::default()
    };
    let policy = SerializationPolicy::new(cli.depth)
        .context("invalid --depth")?
        .include_type_names(!cli.no_type_information)
        .with_known_types(known_types);
    Ok(policy)
}

fn read_input(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(path) if path.as_os_str() != "-" => fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        _ => {
            let mut input = String::new();
            io::stdin()
                .read_to_string(&mut input)
                .context("failed to read stdin")?;
            Ok(input)
        }
    }
}

/// A top-level array is a sequence of items; anything else is one item.
fn top_level_items(json: &serde_json::Value) -> Vec<Value> {
    match json {
        serde_json::Value::Array(items) => items.iter().map(convert).collect(),
        other => vec![convert(other)],
    }
}

fn convert(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(val) => (*val).into(),
        serde_json::Value::Number(number) => {
            if let Some(val) = number.as_i64() {
                val.into()
            } else if let Some(val) = number.as_u64() {
                val.into()
            } else {
                number.as_f64().map_or(Value::Null, Value::from)
            }
        }
        serde_json::Value::String(val) => val.as_str().into(),
        serde_json::Value::Array(items) => Value::list(items.iter().map(convert)),
        serde_json::Value::Object(map) => map
            .iter()
            .fold(Object::new(JSON_OBJECT_TYPE), |object, (key, val)| {
                object.with(key.as_str(), convert(val))
            })
            .into(),
    }
}

fn ctrlc_handler(stop: StopHandle) {
    let _ = ctrlc::set_handler(move || {
        info!("received Ctrl+C, stopping");
        stop.request_cancel();
    });
}

#[cfg(test)]
mod tests {
    use super::{convert, top_level_items, JSON_OBJECT_TYPE};
    use objxml::primitives::Primitive;
    use objxml::Value;
    use serde_json::json;
    use test_log::test;

    #[test]
    fn json_objects_become_custom_objects() {
        match convert(&json!({"name": "x", "size": 3, "ok": true})) {
            Value::Object(object) => {
                assert_eq!(object.type_name(), JSON_OBJECT_TYPE);
                assert_eq!(object.properties().len(), 3);
                assert!(object.property("size").is_some());
            }
            other => panic!("unexpected value {:?}", other),
        }
    }

    #[test]
    fn numbers_keep_their_width() {
        assert!(matches!(
            convert(&json!(-4)),
            Value::Primitive(Primitive::I64(-4))
        ));
        assert!(matches!(
            convert(&json!(u64::MAX)),
            Value::Primitive(Primitive::U64(u64::MAX))
        ));
        assert!(matches!(
            convert(&json!(1.5)),
            Value::Primitive(Primitive::F64(_))
        ));
    }

    #[test]
    fn top_level_arrays_are_split() {
        assert_eq!(top_level_items(&json!([1, null, "a"])).len(), 3);
        assert_eq!(top_level_items(&json!({"a": [1, 2]})).len(), 1);
    }
}
