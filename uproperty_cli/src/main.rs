mod logging;
mod schema;

use std::fs;
use std::path::PathBuf;
use std::ptr::NonNull;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use indexmap::IndexMap;
use itertools::Itertools;
use prettytable::{format, row, Table};
use uproperty::archive::FPackageFileSummary;
use uproperty::*;

use schema::{Schema, DEMO_SCHEMA};

#[derive(Parser)]
enum Commands {
    Layout(CommandLayout),
    Export(CommandExport),
    Set(CommandSet),
    Roundtrip(CommandRoundtrip),
    Tokens(CommandTokens),
    Gc(CommandGc),
}

#[derive(Parser)]
struct CommonArgs {
    /// A path to a JSON type library. Uses the built-in demo types if omitted
    #[arg(long)]
    schema: Option<PathBuf>,

    /// Also write a detailed log to this file
    #[arg(long)]
    log_file: Option<PathBuf>,
}

#[derive(Parser)]
struct CommandLayout {
    #[command(flatten)]
    common: CommonArgs,

    /// A struct or class to show (can be specified multiple times). Shows everything if
    /// omitted. Supports globs
    #[arg(short, long)]
    class: Vec<String>,
}

#[derive(Parser)]
struct CommandExport {
    #[command(flatten)]
    common: CommonArgs,

    /// Class of the object to export
    class: String,
}

#[derive(Parser)]
struct CommandSet {
    #[command(flatten)]
    common: CommonArgs,

    /// Class of the object to edit
    class: String,

    /// Assignments such as `Health=50` or `Ammo(2)=7`
    #[arg(required = true)]
    assignments: Vec<String>,
}

#[derive(Parser)]
struct CommandRoundtrip {
    #[command(flatten)]
    common: CommonArgs,

    /// Class of the object to save and load back
    class: String,

    /// Assignments applied before saving, such as `Health=50`
    #[arg(short, long)]
    set: Vec<String>,

    /// Use untagged binary serialization
    #[arg(long)]
    binary: bool,

    /// File the object is saved to
    #[arg(short, long, default_value = "roundtrip.bin")]
    output: PathBuf,
}

#[derive(Parser)]
struct CommandTokens {
    #[command(flatten)]
    common: CommonArgs,

    /// Class whose garbage collection token stream is shown
    class: String,
}

#[derive(Parser)]
struct CommandGc {
    #[command(flatten)]
    common: CommonArgs,

    /// Class of the created objects. Needs an object reference property to link them
    #[arg(default_value = "Pawn")]
    class: String,

    /// Number of objects to create
    #[arg(short, long, default_value_t = 8)]
    count: usize,

    /// Number of objects reachable from the rooted first object
    #[arg(short, long, default_value_t = 4)]
    linked: usize,
}

fn main() -> Result<()> {
    match Commands::parse() {
        Commands::Layout(command) => layout(command),
        Commands::Export(command) => export(command),
        Commands::Set(command) => set(command),
        Commands::Roundtrip(command) => roundtrip(command),
        Commands::Tokens(command) => tokens(command),
        Commands::Gc(command) => gc(command),
    }
}

fn setup(common: &CommonArgs) -> Result<(logging::LogGuards, FUObjectArray)> {
    let guards = logging::setup_logging(common.log_file.as_deref())?;
    let json = match &common.schema {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("failed to read schema {}", path.display()))?,
        None => DEMO_SCHEMA.to_string(),
    };
    let objects = FUObjectArray::new();
    Schema::parse(&json)?.register(&objects)?;
    Ok((guards, objects))
}

fn find_class(objects: &FUObjectArray, name: &str) -> Result<Arc<UClass>> {
    let class = objects
        .find_struct(FName::new(name))
        .with_context(|| format!("class '{name}' not found"))?;
    if !class.is_class() {
        bail!("'{name}' is a {}, not a class", class.kind());
    }
    Ok(class)
}

fn new_object(objects: &mut FUObjectArray, class: &Arc<UClass>) -> Result<NonNull<UObject>> {
    Ok(objects.new_object(class, None, NAME_NONE, EObjectFlags::RF_NoFlags)?)
}

fn flag_names<B: bitflags::Flags>(flags: B) -> String {
    flags.iter_names().map(|(name, _)| name).join(" | ")
}

fn layout(command: CommandLayout) -> Result<()> {
    let (_guards, objects) = setup(&command.common)?;

    let filters = command
        .class
        .iter()
        .map(|g| {
            Ok(globset::GlobBuilder::new(g)
                .case_insensitive(true)
                .build()?
                .compile_matcher())
        })
        .collect::<Result<Vec<_>>>()?;

    let structs = objects
        .structs()
        .into_iter()
        .filter(|s| {
            let name = s.get_fname().to_string();
            filters.is_empty() || filters.iter().any(|g| g.is_match(&name))
        })
        .collect_vec();
    if structs.is_empty() {
        bail!("no types match {:?}", command.class);
    }

    for ustruct in structs {
        let super_name = ustruct
            .get_super_struct()
            .map(|s| format!(" : {}", s.get_fname()))
            .unwrap_or_default();
        println!(
            "{} {}{} size={} align={}",
            ustruct.kind().to_string().bright_blue(),
            ustruct.get_fname().to_string().bold(),
            super_name,
            ustruct.properties_size(),
            ustruct.min_alignment()
        );

        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        table.set_titles(row!["offset", "size", "name", "type", "flags"]);
        for property in TFieldRange::<UProperty>::new(&ustruct, EFieldIteratorFlags::default()) {
            let mut extended = String::new();
            let mut type_name = property.get_cpp_type(Some(&mut extended), EPropertyExportCPPFlags::CPPF_None);
            type_name.push_str(&extended);
            if property.array_dim() > 1 {
                type_name.push_str(&format!("[{}]", property.array_dim()));
            }
            let offset = match property.kind() {
                PropertyKind::Bool(b) if !b.is_native_bool() => format!(
                    "{:#06x} & {:#04x}",
                    property.get_offset_for_debug() + i32::from(b.byte_offset()),
                    b.byte_mask()
                ),
                _ => format!("{:#06x}", property.get_offset_for_debug()),
            };
            table.add_row(row![
                offset,
                property.get_size(),
                property.get_name(),
                type_name,
                flag_names(property.property_flags())
            ]);
        }
        table.printstd();

        if let Some(functions) = ustruct
            .children()
            .iter()
            .filter_map(UField::as_function)
            .map(|f| format!("{}({})", f.get_fname(), f.parameters().map(|p| p.get_name()).join(", ")))
            .reduce(|a, b| format!("{a}, {b}"))
        {
            println!("  functions: {functions}");
        }
        println!();
    }
    Ok(())
}

fn export(command: CommandExport) -> Result<()> {
    let (_guards, mut objects) = setup(&command.common)?;
    let class = find_class(&objects, &command.class)?;
    let object = new_object(&mut objects, &class)?;

    let mut out = String::new();
    unsafe {
        class.export_properties(
            &mut out,
            object.as_ref().as_container(),
            None,
            EPropertyPortFlags::PPF_None,
            &objects,
        )
    };
    println!("{}", unsafe { object.as_ref() }.get_full_name().bold());
    print!("{out}");
    Ok(())
}

/// Logs every change notification it receives.
#[derive(Default)]
struct ChangeLogger {
    changes: usize,
}

impl EditChangeListener for ChangeLogger {
    fn pre_edit_change(&mut self, object: &UObject, chain: &FEditPropertyChain) {
        tracing::debug!(
            "PreEditChange {} [{}]",
            object.get_path_name(),
            chain.iter().map(|p| p.get_name()).join(".")
        );
    }

    fn post_edit_change_property(&mut self, object: &UObject, event: &FPropertyChangedEvent) {
        self.changes += 1;
        let index = event.get_array_index(&event.get_property_name().to_string());
        tracing::info!(
            "PostEditChange {}.{} (member {}, index {index}, {:?})",
            object.get_path_name(),
            event.get_property_name(),
            event.get_member_property_name(),
            event.change_type
        );
    }
}

/// Property name and static array index of an assignment like `Ammo(2)=7`.
fn assignment_target(assignment: &str) -> Result<(&str, i32)> {
    let Some((target, _)) = assignment.split_once('=') else {
        bail!("expected Name=Value, got '{assignment}'");
    };
    let target = target.trim();
    match target.split_once(['(', '[']) {
        Some((name, index)) => {
            let index = index.trim_end_matches([')', ']']);
            Ok((name.trim(), index.trim().parse().with_context(|| format!("bad index in '{target}'"))?))
        }
        None => Ok((target, 0)),
    }
}

/// Imports assignments into `object`, notifying `listener` around each one.
fn apply_assignments(
    objects: &FUObjectArray,
    class: &Arc<UClass>,
    object: NonNull<UObject>,
    assignments: &[String],
    listener: &mut dyn EditChangeListener,
) -> Result<()> {
    let object_ref = unsafe { object.as_ref() };
    for assignment in assignments {
        let (name, index) = assignment_target(assignment)?;
        let property = find_field_checked::<UProperty>(class, FName::new(name))?;

        let mut chain = FEditPropertyChain::new();
        chain.add_head(&property);
        chain.set_active_property_node(&property);
        chain.set_active_member_property_node(&property);
        listener.pre_edit_change(object_ref, &chain);

        let mut warnings = FStringOutputDevice::new();
        unsafe {
            class.import_properties(
                assignment,
                object_ref.as_container(),
                EPropertyPortFlags::PPF_None,
                objects,
                &mut warnings,
            )
        };
        if !warnings.is_empty() {
            bail!("failed to apply '{assignment}': {}", warnings.lines().join("; "));
        }

        let mut event = FPropertyChangedEvent::new(Some(&property), EPropertyChangeType::ValueSet);
        event.object_iterator_index = 0;
        event.set_array_index_per_object(vec![IndexMap::from([(property.get_fname(), index)])]);
        listener.post_edit_change_chain_property(
            object_ref,
            &FPropertyChangedChainEvent::new(chain, event),
        );
    }
    Ok(())
}

fn set(command: CommandSet) -> Result<()> {
    let (_guards, mut objects) = setup(&command.common)?;
    let class = find_class(&objects, &command.class)?;
    let object = new_object(&mut objects, &class)?;
    let defaults = new_object(&mut objects, &class)?;

    let mut listener = ChangeLogger::default();
    apply_assignments(&objects, &class, object, &command.assignments, &mut listener)?;

    let mut out = String::new();
    unsafe {
        class.export_properties(
            &mut out,
            object.as_ref().as_container(),
            Some(defaults.as_ref().as_container()),
            EPropertyPortFlags::PPF_None,
            &objects,
        )
    };
    println!(
        "{} ({} changes)",
        unsafe { object.as_ref() }.get_full_name().bold(),
        listener.changes
    );
    print!("{out}");
    Ok(())
}

fn roundtrip(command: CommandRoundtrip) -> Result<()> {
    let (_guards, mut objects) = setup(&command.common)?;
    let class = find_class(&objects, &command.class)?;
    let source = new_object(&mut objects, &class)?;
    let defaults = new_object(&mut objects, &class)?;
    let loaded = new_object(&mut objects, &class)?;
    apply_assignments(&objects, &class, source, &command.set, &mut ChangeLogger::default())?;

    let source_data = unsafe { source.as_ref() }.as_container();
    let defaults_data = unsafe { defaults.as_ref() }.as_container();
    let loaded_data = unsafe { loaded.as_ref() }.as_container();

    let bytes = {
        let mut writer = MemoryWriter::new().with_objects(&objects);
        if command.binary {
            writer = writer.binary();
        }
        FPackageFileSummary::default().serialize(&mut writer)?;
        unsafe {
            if command.binary {
                class.serialize_bin(&mut writer, source_data)?;
            } else {
                class.serialize_tagged_properties(&mut writer, source_data, Some(&class), Some(defaults_data))?;
            }
        }
        writer.into_bytes()
    };
    fs::write(&command.output, &bytes)
        .with_context(|| format!("failed to write {}", command.output.display()))?;
    tracing::info!("Wrote {} bytes to {}", bytes.len(), command.output.display());

    let bytes = fs::read(&command.output)
        .with_context(|| format!("failed to read {}", command.output.display()))?;
    let mut reader = MemoryReader::new(&bytes).with_objects(&objects);
    if command.binary {
        reader = reader.binary();
    }
    FPackageFileSummary::default().serialize(&mut reader)?;
    unsafe {
        if command.binary {
            class.serialize_bin(&mut reader, loaded_data)?;
        } else {
            class.serialize_tagged_properties(&mut reader, loaded_data, None, None)?;
        }
    }
    if !reader.at_end() {
        bail!("trailing data after {}", class.get_fname());
    }

    let mut table = Table::new();
    table.set_titles(row!["property", "saved", "loaded"]);
    let mut differences = 0;
    for property in class.property_link() {
        for index in 0..property.array_dim() {
            let same = unsafe {
                property.identical_in_container(source_data, Some(loaded_data), index, EPropertyPortFlags::PPF_None)
            };
            if same {
                continue;
            }
            differences += 1;
            let text = |data: *mut u8| {
                let mut out = String::new();
                unsafe {
                    property.export_text_in_container(
                        index,
                        &mut out,
                        data,
                        None,
                        None,
                        EPropertyPortFlags::PPF_None,
                        &objects,
                    )
                };
                out
            };
            table.add_row(row![
                format!("{}[{index}]", property.get_name()),
                text(source_data),
                text(loaded_data)
            ]);
        }
    }

    let mode = if command.binary { "binary" } else { "tagged" };
    if differences == 0 {
        println!("{} {mode} round trip of {} ({} bytes)", "ok".green(), class.get_fname(), bytes.len());
        Ok(())
    } else {
        table.printstd();
        bail!("{differences} values differ after the {mode} round trip")
    }
}

fn tokens(command: CommandTokens) -> Result<()> {
    let (_guards, objects) = setup(&command.common)?;
    let class = find_class(&objects, &command.class)?;
    let stream = class.reference_token_stream();
    println!(
        "{} {} tokens",
        class.get_fname().to_string().bold(),
        stream.len()
    );
    print!("{stream}");
    Ok(())
}

fn gc(command: CommandGc) -> Result<()> {
    let (_guards, mut objects) = setup(&command.common)?;
    let class = find_class(&objects, &command.class)?;
    let link = TFieldIterator::<field_iterator::UObjectProperty>::new(&class, EFieldIteratorFlags::default())
        .find(|p| p.array_dim() == 1)
        .cloned()
        .with_context(|| format!("'{}' has no object reference property", class.get_fname()))?;

    let created = (0..command.count)
        .map(|_| new_object(&mut objects, &class))
        .collect::<Result<Vec<_>>>()?;
    for (from, to) in created.iter().zip(created.iter().skip(1)).take(command.linked.saturating_sub(1)) {
        unsafe {
            TypeFundamentals::<ObjectPtr>::set_property_value(
                link.container_ptr_to_value_ptr(from.as_ref().as_container(), 0),
                Some(*to),
            )
        };
    }
    let weak = created
        .last()
        .map(|last| FWeakObjectPtr::new(Some(*last), &objects));
    if let Some(first) = created.first() {
        objects.add_to_root(*first);
    }
    tracing::info!(
        "Created {} objects linked through {}",
        created.len(),
        link.get_name()
    );

    let purged = collect_garbage(&mut objects, EObjectFlags::RF_NoFlags)?;

    let mut table = Table::new();
    table.set_titles(row!["index", "object", "flags"]);
    for object in objects.iter() {
        let object = unsafe { object.as_ref() };
        table.add_row(row![
            object.internal_index(),
            object.get_full_name(),
            flag_names(object.flags())
        ]);
    }
    table.printstd();
    println!("purged {} objects, {} survive", purged.to_string().red(), objects.num().to_string().green());
    if let Some(weak) = weak {
        let state = if weak.is_stale(&objects) { "stale".red() } else { "valid".green() };
        println!("weak pointer to the last object is {state}");
    }
    Ok(())
}
