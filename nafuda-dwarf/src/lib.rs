//! nafuda シンボル情報
//!
//! このクレートは、ELFファイルとDWARFデバッグ情報からモジュールを構築し、
//! 関数名の各形式（完全名・基底名・セレクタ・マングル名）による検索を提供します。
//! ブレークポイントの名前解決はこのインデックスを引いて行われます。

pub mod const_string;
pub mod language;
pub mod lines;
pub mod loader;
pub mod module;
pub mod names;
pub mod symbols;
pub mod utils;

pub use const_string::ConstString;
pub use language::LanguageType;
pub use lines::{LineInfo, LineInfoProvider, LineTable};
pub use loader::{DwarfLoader, DwarfReader};
pub use module::{CompileUnit, Module, ModuleBuilder, ModuleId};
pub use names::{FunctionNameType, ObjCMethodName};
pub use symbols::{CompileUnitId, Symbol, SymbolId, SymbolKind, SymbolSource};
pub use utils::{DebugFunction, DebugUnit, FunctionFinder};

/// シンボル情報の結果型
pub type Result<T> = anyhow::Result<T>;
