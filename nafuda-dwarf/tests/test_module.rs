//! モジュール構築と名前インデックスのテスト

use nafuda_dwarf::{ConstString, FunctionNameType, LanguageType, Module, ModuleBuilder, Symbol};

fn cpp_module() -> Module {
    let mut builder = ModuleBuilder::new("libvec.so").slide(0x10000);
    let cu = builder.add_compile_unit("vec.cpp", LanguageType::CPlusPlus);

    builder.add_function(cu, Symbol::new("_ZNSt6vectorIiE9push_backERKi", Some(0x1000), 0x40));
    builder.add_function(cu, Symbol::new("_ZN7MyClass9push_backEi", Some(0x2000), 0x20));

    builder.add_function_symbol("main", 0x3000, 0x10);
    builder.add_function_symbol("foobar", 0x3100, 0x10);
    builder.build()
}

#[test]
fn test_find_by_base_name() {
    let module = cpp_module();
    let hits = module.find_by_name(ConstString::new("push_back"), FunctionNameType::BASE, None);
    assert_eq!(hits.len(), 2);

    let names: Vec<&str> = hits
        .iter()
        .map(|id| module.symbol(*id).unwrap().full_name())
        .collect();
    assert!(names.contains(&"std::vector<int>::push_back"));
    assert!(names.contains(&"MyClass::push_back"));
}

#[test]
fn test_find_by_full_name_is_exact() {
    let module = cpp_module();
    let hits = module.find_by_name(ConstString::new("main"), FunctionNameType::FULL, None);
    assert_eq!(hits.len(), 1);

    // 基底名のバケットを指定しなければ push_back は完全名として見つからない
    let hits = module.find_by_name(ConstString::new("push_back"), FunctionNameType::FULL, None);
    assert!(hits.is_empty());
}

#[test]
fn test_find_by_mangled_name() {
    let module = cpp_module();
    let hits = module.find_by_name(
        ConstString::new("_ZN7MyClass9push_backEi"),
        FunctionNameType::MANGLED,
        None,
    );
    assert_eq!(hits.len(), 1);
}

#[test]
fn test_symbol_table_only_cpp_names() {
    let mut builder = ModuleBuilder::new("libstripped.so");
    let mine = builder.add_function_symbol("_ZN7MyClass9push_backEi", 0x2000, 0x20);
    let vector = builder.add_function_symbol("_ZNSt6vectorIiE9push_backERKi", 0x1000, 0x40);
    let module = builder.build();

    let sym = module.symbol(mine).unwrap();
    assert_eq!(sym.display_name(), "MyClass::push_back(int)");
    assert_eq!(sym.language, LanguageType::CPlusPlus);

    let by_mangled = module.find_by_name(
        ConstString::new("_ZN7MyClass9push_backEi"),
        FunctionNameType::MANGLED,
        None,
    );
    assert_eq!(by_mangled, vec![mine]);

    let by_base = module.find_by_name(ConstString::new("push_back"), FunctionNameType::BASE, None);
    assert_eq!(by_base, vec![mine, vector]);

    let by_full = module.find_by_name(
        ConstString::new("std::vector<int>::push_back"),
        FunctionNameType::FULL,
        None,
    );
    assert_eq!(by_full, vec![vector]);
}

#[test]
fn test_multiple_buckets_do_not_duplicate() {
    let module = cpp_module();
    let hits = module.find_by_name(ConstString::new("main"), FunctionNameType::INDEXED, None);
    assert_eq!(hits.len(), 1);
}

#[test]
fn test_compile_unit_scope() {
    let module = cpp_module();
    let (cu, unit) = module.compile_units().next().unwrap();
    assert_eq!(unit.functions.len(), 2);

    let hits = module.find_by_name(ConstString::new("main"), FunctionNameType::FULL, Some(cu));
    assert!(hits.is_empty());
    assert!(module.has_unattributed_functions());
    assert_eq!(module.all_functions(Some(cu)).count(), 2);
    assert_eq!(module.all_functions(None).count(), 4);
}

#[test]
fn test_load_address_and_reverse_lookup() {
    let module = cpp_module();
    let hits = module.find_by_name(ConstString::new("main"), FunctionNameType::FULL, None);
    assert_eq!(module.load_address(hits[0]), Some(0x13000));

    let (_, sym) = module.symbol_at(0x13008).unwrap();
    assert_eq!(sym.display_name(), "main");
    assert!(module.symbol_at(0x500).is_none());
}

#[test]
fn test_zero_size_symbol_covers_only_its_start() {
    let mut builder = ModuleBuilder::new("liba.so");
    builder.add_function_symbol("_start", 0x100, 0);
    let module = builder.build();

    assert_eq!(module.symbol_at(0x100).unwrap().1.display_name(), "_start");
    assert!(module.symbol_at(0x101).is_none());
    assert!(module.symbol_at(0x5010).is_none());
}

#[test]
fn test_symbol_table_alias_joins_compile_unit() {
    let mut builder = ModuleBuilder::new("a.out");
    let cu = builder.add_compile_unit("main.c", LanguageType::C);
    let mut debug = Symbol::new("work", Some(0x400), 0x30);
    debug.prologue_size = Some(8);
    builder.add_function(cu, debug);
    let table_id = builder.add_function_symbol("work", 0x400, 0x30);
    let module = builder.build();

    let sym = module.symbol(table_id).unwrap();
    assert_eq!(sym.compile_unit, Some(cu));
    assert_eq!(sym.prologue_size, Some(8));
}

#[test]
fn test_objc_selector_index() {
    let mut builder = ModuleBuilder::new("Foundation");
    let cu = builder.add_compile_unit("Foo.m", LanguageType::ObjC);
    builder.add_function(cu, Symbol::new("-[Foo bar:]", Some(0x100), 0x10));
    builder.add_function(cu, Symbol::new("+[Foo bar:]", Some(0x200), 0x10));
    builder.add_function(cu, Symbol::new("-[Baz bar:]", Some(0x300), 0x10));
    let module = builder.build();

    let by_selector = module.find_by_name(ConstString::new("bar:"), FunctionNameType::SELECTOR, None);
    assert_eq!(by_selector.len(), 3);

    let by_class = module.find_by_name(ConstString::new("[Foo bar:]"), FunctionNameType::SELECTOR, None);
    assert_eq!(by_class.len(), 2);

    let full = module.find_by_name(ConstString::new("-[Foo bar:]"), FunctionNameType::FULL, None);
    assert_eq!(full.len(), 1);
}

#[test]
fn test_objc_category_method_full_name() {
    let mut builder = ModuleBuilder::new("Foundation");
    let cu = builder.add_compile_unit("Foo+Extras.m", LanguageType::ObjC);
    let id = builder.add_function(cu, Symbol::new("-[Foo(Extras) baz:]", Some(0x100), 0x10));
    let module = builder.build();

    let plain = module.find_by_name(ConstString::new("-[Foo baz:]"), FunctionNameType::FULL, None);
    assert_eq!(plain, vec![id]);
    let literal = module.find_by_name(
        ConstString::new("-[Foo(Extras) baz:]"),
        FunctionNameType::FULL,
        None,
    );
    assert_eq!(literal, vec![id]);
    // クラスメソッドとしては見つからない
    assert!(module
        .find_by_name(ConstString::new("+[Foo baz:]"), FunctionNameType::FULL, None)
        .is_empty());
}

#[no_mangle]
#[inline(never)]
pub extern "C" fn nafuda_marker_function(x: u64) -> u64 {
    x.wrapping_mul(31).wrapping_add(7)
}

#[cfg(target_os = "linux")]
#[test]
fn test_load_current_executable() {
    assert_eq!(nafuda_marker_function(1), 38);

    let exe = std::env::current_exe().expect("current_exe");
    let module = Module::load(&exe, 0).expect("Failed to load test executable");

    let hits = module.find_by_name(
        ConstString::new("nafuda_marker_function"),
        FunctionNameType::FULL,
        None,
    );
    assert!(!hits.is_empty(), "Should find the marker function");
    assert!(hits.iter().all(|id| module.load_address(*id).is_some()));
}
