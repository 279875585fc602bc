use ptdbg::dwarf::FunctionEntry;
use ptdbg::elf_items::ObjectInfo;
use ptdbg::symbols::{display_name, SymbolKind};

#[inline(never)]
fn ptdbg_sample_function(x: u64) -> u64 {
    let doubled = x.wrapping_mul(2);
    let shifted = doubled.rotate_left(7);
    shifted ^ 0x5a5a
}

#[no_mangle]
#[inline(never)]
pub extern "C" fn ptdbg_exported_sample(x: u64) -> u64 {
    x.wrapping_add(41)
}

fn load_self() -> ObjectInfo {
    // Keep both samples in the binary
    std::hint::black_box(ptdbg_sample_function(std::hint::black_box(3)));
    std::hint::black_box(ptdbg_exported_sample(std::hint::black_box(1)));

    let exe = std::env::current_exe().unwrap();
    ObjectInfo::load(&exe).expect("Failed to load own debug info")
}

fn find_function(object: &ObjectInfo, name: &str) -> FunctionEntry {
    object
        .debug_info
        .units()
        .iter()
        .flat_map(|u| u.functions.iter())
        .find(|f| f.name == name)
        .cloned()
        .unwrap_or_else(|| panic!("{} not found in DWARF", name))
}

#[test]
fn test_function_and_line_lookup_on_own_binary() {
    let object = load_self();
    let func = find_function(&object, "ptdbg_sample_function");
    assert!(func.low_pc < func.high_pc);

    let containing = object.debug_info.function_containing(func.low_pc).unwrap();
    assert_eq!(containing.name, "ptdbg_sample_function");
    assert_eq!(
        object.debug_info.function_containing(func.high_pc - 1).unwrap().name,
        "ptdbg_sample_function"
    );

    let entry = object.debug_info.line_entry_for(func.low_pc).unwrap();
    assert!(entry.file.ends_with("debug_info_test.rs"), "{}", entry.file);
    assert!(entry.line > 0);
}

#[test]
fn test_function_breakpoint_is_past_the_entry() {
    let object = load_self();
    let func = find_function(&object, "ptdbg_sample_function");
    let addrs = object
        .debug_info
        .function_breakpoint_addresses("ptdbg_sample_function")
        .unwrap();
    assert_eq!(addrs.len(), 1);
    assert!(addrs[0] > func.low_pc, "{:#x} <= {:#x}", addrs[0], func.low_pc);
    assert!(addrs[0] < func.high_pc);
}

/// First statement row of `func` in this file below its entry line. Rows
/// inlined from other files (core's integer helpers) are passed over.
fn body_line(object: &ObjectInfo, func: &FunctionEntry) -> u64 {
    let info = &object.debug_info;
    let entry_line = info.line_entry_for(func.low_pc).unwrap().line;
    info.units()
        .iter()
        .flat_map(|u| u.lines.iter())
        .filter(|r| func.contains(r.address) && r.is_stmt && !r.end_sequence)
        .find(|r| r.line > entry_line && info.file_name(r.file_id).ends_with("debug_info_test.rs"))
        .map(|r| r.line)
        .expect("no body row of the sample function in this file")
}

#[test]
fn test_line_breakpoint_resolves_into_the_function() {
    let object = load_self();
    let func = find_function(&object, "ptdbg_sample_function");
    let line = body_line(&object, &func);

    let addr = object
        .debug_info
        .line_breakpoint_address("debug_info_test.rs", line)
        .expect("no statement for the body line");
    assert!(func.contains(addr), "{:#x} outside {:?}", addr, func);
    assert!(object
        .debug_info
        .line_breakpoint_address("no_such_file.rs", line)
        .is_none());
}

#[test]
fn test_statement_walk_covers_the_body() {
    let object = load_self();
    let func = find_function(&object, "ptdbg_sample_function");
    let stmts = object.debug_info.statement_addresses(&func).unwrap();
    assert!(!stmts.is_empty());
    assert!(stmts.iter().all(|a| func.contains(*a)));
}

#[test]
fn test_symbol_tables() {
    let object = load_self();
    let found = object.symbols.get_by_name("ptdbg_exported_sample");
    assert!(!found.is_empty(), "exported sample missing from the symbol tables");
    assert!(found.iter().all(|s| s.kind == SymbolKind::Function));
    assert!(object.symbols.get_by_name("ptdbg_exported_sampl").is_empty());

    // Symbol and DWARF addresses are both link-time addresses.
    let func = find_function(&object, "ptdbg_exported_sample");
    assert!(found.iter().any(|s| s.address == func.low_pc));
    assert_eq!(display_name(&found[0].name), "ptdbg_exported_sample");
}
