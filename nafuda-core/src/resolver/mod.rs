//! ブレークポイントリゾルバ
//!
//! リゾルバは「どこにブレークポイントを置くか」の指定を、読み込まれたモジュール上の
//! 具体的なアドレスに変換する。種類は閉じた列挙で表し、種別の判定はタグで行う。

pub mod address;
pub mod lookup;
pub mod name;

pub use address::AddressResolver;
pub use lookup::LookupInfo;
pub use name::{MatchType, NameResolver};

use crate::search::{CallbackReturn, SearchDepth, SearchFilter, Searcher, SymbolContext};
use crate::BreakpointId;
use nafuda_dwarf::LanguageType;

/// ブレークポイントごとの設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakpointOptions {
    /// 名前の解釈に使う言語
    pub language: LanguageType,
    /// 関数先頭からのオフセット
    pub offset: u64,
    /// プロローグを飛ばすか
    pub skip_prologue: bool,
}

impl Default for BreakpointOptions {
    fn default() -> Self {
        Self {
            language: LanguageType::Unknown,
            offset: 0,
            skip_prologue: true,
        }
    }
}

/// ロケーションID
pub type LocationId = usize;

/// 一致したシンボルからブレークポイントロケーションを作る側
pub trait LocationEmitter {
    /// `context` のシンボルにロケーションを作る。作れなければNone
    fn create_location(
        &mut self,
        context: &SymbolContext,
        offset: u64,
        skip_prologue: bool,
    ) -> Option<LocationId>;
}

/// ロケーションを置くアドレスを計算する
///
/// ロードアドレスに、プロローグを飛ばす場合はその長さ（分かっている場合のみ）、
/// さらにオフセットを加える。
pub fn location_address(context: &SymbolContext, offset: u64, skip_prologue: bool) -> Option<u64> {
    let base = context.load_address()?;
    let prologue = if skip_prologue {
        context.symbol()?.prologue_size.unwrap_or(0)
    } else {
        0
    };
    Some(base.wrapping_add(prologue).wrapping_add(offset))
}

/// リゾルバの種別タグ
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResolverKind {
    Name,
    Address,
}

impl ResolverKind {
    pub fn name(&self) -> &'static str {
        match self {
            ResolverKind::Name => "name",
            ResolverKind::Address => "address",
        }
    }
}

/// ブレークポイントリゾルバ
#[derive(Debug, Clone)]
pub enum BreakpointResolver {
    Name(NameResolver),
    Address(AddressResolver),
}

impl BreakpointResolver {
    /// 種別タグ
    pub fn kind(&self) -> ResolverKind {
        match self {
            BreakpointResolver::Name(_) => ResolverKind::Name,
            BreakpointResolver::Address(_) => ResolverKind::Address,
        }
    }

    /// 名前リゾルバかどうか
    pub fn is_name_resolver(&self) -> bool {
        self.kind() == ResolverKind::Name
    }

    /// 名前リゾルバとして取り出す
    pub fn as_name(&self) -> Option<&NameResolver> {
        if self.kind() != ResolverKind::Name {
            return None;
        }
        match self {
            BreakpointResolver::Name(r) => Some(r),
            _ => None,
        }
    }

    /// アドレスリゾルバとして取り出す
    pub fn as_address(&self) -> Option<&AddressResolver> {
        if self.kind() != ResolverKind::Address {
            return None;
        }
        match self {
            BreakpointResolver::Address(r) => Some(r),
            _ => None,
        }
    }

    /// 別のブレークポイント用に独立したコピーを作る
    pub fn copy_for_breakpoint(&self, owner: BreakpointId) -> Self {
        match self {
            BreakpointResolver::Name(r) => BreakpointResolver::Name(r.copy_for_breakpoint(owner)),
            BreakpointResolver::Address(r) => BreakpointResolver::Address(r.copy_for_breakpoint(owner)),
        }
    }

    pub(crate) fn set_owner(&mut self, owner: BreakpointId) {
        match self {
            BreakpointResolver::Name(r) => r.set_owner(owner),
            BreakpointResolver::Address(r) => r.set_owner(owner),
        }
    }

    pub fn owner(&self) -> Option<BreakpointId> {
        match self {
            BreakpointResolver::Name(r) => r.owner(),
            BreakpointResolver::Address(r) => r.owner(),
        }
    }

    /// 表示用の説明
    pub fn description(&self) -> String {
        match self {
            BreakpointResolver::Name(r) => r.description(),
            BreakpointResolver::Address(r) => r.description(),
        }
    }

    /// デバッグ用の詳細表示
    pub fn dump(&self) -> String {
        match self {
            BreakpointResolver::Name(r) => r.dump(),
            BreakpointResolver::Address(r) => r.dump(),
        }
    }
}

impl From<NameResolver> for BreakpointResolver {
    fn from(r: NameResolver) -> Self {
        BreakpointResolver::Name(r)
    }
}

impl From<AddressResolver> for BreakpointResolver {
    fn from(r: AddressResolver) -> Self {
        BreakpointResolver::Address(r)
    }
}

impl Searcher for BreakpointResolver {
    fn depth(&self) -> SearchDepth {
        match self {
            BreakpointResolver::Name(r) => r.depth(),
            BreakpointResolver::Address(r) => r.depth(),
        }
    }

    fn search_callback(
        &self,
        filter: &SearchFilter,
        context: &SymbolContext,
        addr: Option<u64>,
        containing: bool,
        emitter: &mut dyn LocationEmitter,
    ) -> CallbackReturn {
        match self {
            BreakpointResolver::Name(r) => r.search_callback(filter, context, addr, containing, emitter),
            BreakpointResolver::Address(r) => r.search_callback(filter, context, addr, containing, emitter),
        }
    }
}
