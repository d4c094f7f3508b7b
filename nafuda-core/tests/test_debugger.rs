use nafuda_core::{
    BreakpointOptions, Command, Debugger, FunctionNameType, LanguageType, ModuleBuilder, Symbol,
};

fn cxx_module(slide: u64) -> nafuda_core::Module {
    let mut builder = ModuleBuilder::new("libvec.so").slide(slide);
    let cu = builder.add_compile_unit("vec.cpp", LanguageType::CPlusPlus);
    for (name, addr) in [
        ("std::vector<int>::push_back", 0x1000),
        ("MyClass::push_back", 0x1100),
        ("MyClass::pop", 0x1200),
    ] {
        let mut sym = Symbol::new(name, Some(addr), 0x40);
        sym.language = LanguageType::CPlusPlus;
        sym.prologue_size = Some(4);
        builder.add_function(cu, sym);
    }
    builder.build()
}

fn c_module() -> nafuda_core::Module {
    let mut builder = ModuleBuilder::new("a.out");
    builder.add_function_symbol("main", 0x500, 0x20);
    builder.add_function_symbol("foobar", 0x600, 0x20);
    builder.build()
}

#[test]
fn test_pending_breakpoint_resolves_on_load() {
    let mut debugger = Debugger::new();
    let id = debugger
        .break_by_name(&["push_back"], FunctionNameType::BASE, &BreakpointOptions::default())
        .unwrap();
    assert!(debugger.breakpoint(id).unwrap().locations().is_empty());

    let added = debugger.add_module(cxx_module(0x7000_0000));
    assert_eq!(added, 2);

    let addrs: Vec<u64> = debugger
        .breakpoint(id)
        .unwrap()
        .locations()
        .iter()
        .map(|l| l.address)
        .collect();
    assert_eq!(addrs, vec![0x7000_1004, 0x7000_1104]);
}

#[test]
fn test_loading_unrelated_module_adds_nothing() {
    let mut debugger = Debugger::new();
    debugger.add_module(cxx_module(0));
    let id = debugger
        .break_by_name(&["MyClass::pop"], FunctionNameType::AUTO, &BreakpointOptions::default())
        .unwrap();
    assert_eq!(debugger.breakpoint(id).unwrap().locations().len(), 1);

    assert_eq!(debugger.add_module(c_module()), 0);
    assert_eq!(debugger.breakpoint(id).unwrap().locations().len(), 1);
}

#[test]
fn test_regex_across_modules() {
    let mut debugger = Debugger::new();
    debugger.add_module(c_module());
    debugger.add_module(cxx_module(0));
    let id = debugger
        .break_by_regex("push|foo", &BreakpointOptions::default())
        .unwrap();
    let functions: Vec<&str> = debugger
        .breakpoint(id)
        .unwrap()
        .locations()
        .iter()
        .map(|l| l.function.as_str())
        .collect();
    assert_eq!(
        functions,
        vec!["foobar", "std::vector<int>::push_back", "MyClass::push_back"]
    );
}

#[test]
fn test_address_breakpoint_and_reverse_resolve() {
    let mut debugger = Debugger::new();
    debugger.add_module(c_module());
    let id = debugger.break_at_address(0x508);
    let loc = debugger.breakpoint(id).unwrap().locations().iter().next().unwrap().clone();
    assert_eq!(loc.address, 0x508);
    assert_eq!(debugger.describe_location(&loc), "0x0000000000000508 in main + 8");

    let (_, sym) = debugger.reverse_resolve(0x610).unwrap();
    assert_eq!(sym.display_name(), "foobar");
    assert!(debugger.reverse_resolve(0x9000).is_none());
}

#[test]
fn test_copy_and_delete() {
    let mut debugger = Debugger::new();
    debugger.add_module(c_module());
    let id = debugger
        .break_by_name(&["main"], FunctionNameType::FULL, &BreakpointOptions::default())
        .unwrap();
    let copy = debugger.copy_breakpoint(id).unwrap();
    assert_eq!(debugger.breakpoint(copy).unwrap().locations().len(), 1);

    debugger.remove_breakpoint(id).unwrap();
    assert!(debugger.remove_breakpoint(id).is_err());
    assert!(debugger.copy_breakpoint(id).is_err());
    assert_eq!(debugger.breakpoints().count(), 1);
}

#[test]
fn test_invalid_specifications() {
    let mut debugger = Debugger::new();
    let empty: [&str; 0] = [];
    let options = BreakpointOptions::default();
    assert!(debugger.break_by_name(&empty, FunctionNameType::FULL, &options).is_err());
    assert!(debugger.break_by_regex("", &options).is_err());
    assert!(debugger.break_by_regex("(", &options).is_err());
    assert!(debugger.break_by_class_selector("", "bar:", &options).is_err());
    assert_eq!(debugger.breakpoints().count(), 0);
}

#[test]
fn test_find_requires_modules() {
    let mut debugger = Debugger::new();
    assert!(debugger.find_symbols("main").is_err());
    debugger.add_module(c_module());
    let found = debugger.find_symbols("foo").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].1.display_name(), "foobar");
}

#[test]
fn test_stripped_cxx_library_by_base_and_full_name() {
    let mut debugger = Debugger::new();
    let mut builder = ModuleBuilder::new("libstripped.so");
    builder.add_function_symbol("_ZNSt6vectorIiE9push_backERKi", 0x1000, 0x40);
    builder.add_function_symbol("_ZN7MyClass9push_backEi", 0x2000, 0x40);
    debugger.add_module(builder.build());

    let options = BreakpointOptions::default();
    let base = debugger
        .break_by_name(&["push_back"], FunctionNameType::BASE, &options)
        .unwrap();
    assert_eq!(debugger.breakpoint(base).unwrap().locations().len(), 2);

    let full = debugger
        .break_by_name(&["MyClass::push_back"], FunctionNameType::AUTO, &options)
        .unwrap();
    let functions: Vec<&str> = debugger
        .breakpoint(full)
        .unwrap()
        .locations()
        .iter()
        .map(|l| l.function.as_str())
        .collect();
    assert_eq!(functions, vec!["MyClass::push_back(int)"]);
}

#[cfg(target_os = "linux")]
#[test]
fn test_slide_ignored_for_fixed_address_executable() {
    let exe = std::env::current_exe().unwrap();
    let pie = nafuda_dwarf::DwarfLoader::load(&exe).unwrap().is_pie();

    let mut debugger = Debugger::new();
    debugger.load_module(&exe, 0x1000).unwrap();
    let expected = if pie { 0x1000 } else { 0 };
    assert_eq!(debugger.modules()[0].slide(), expected);
}

#[test]
fn test_command_drives_break() {
    let Some(Command::Break(spec)) = Command::parse("break -F main -o 2 -P").unwrap() else {
        panic!("expected break command");
    };
    assert_eq!(spec.options.offset, 2);
    assert!(!spec.options.skip_prologue);
}
