use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global string interner shared by every identifier kind.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// Monotonic counter backing generated identifiers.
static COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_serial() -> u64 {
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

macro_rules! interned_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal, $debug:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(Spur);

        impl $name {
            /// Intern a string, or return the existing id if already interned.
            pub fn intern(s: &str) -> Self {
                $name(INTERNER.get_or_intern(s))
            }

            /// Resolve back to a string slice.
            pub fn as_str(&self) -> &'static str {
                INTERNER.resolve(&self.0)
            }

            /// Generate a fresh, process-unique id.
            pub fn generate() -> Self {
                Self::intern(&format!("{}{}", $prefix, next_serial()))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $debug, self.as_str())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::intern(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Ok(Self::intern(&s))
            }
        }
    };
}

interned_id!(
    /// Identifier of a block. Interned: 4 bytes, `Copy`, O(1) `Eq`/`Hash`.
    BlockId,
    "blk_",
    "#"
);

interned_id!(
    /// Identifier of a workspace.
    WorkspaceId,
    "ws_",
    "ws:"
);

interned_id!(
    /// Identifier of a variable in a workspace's variable map.
    VariableId,
    "var_",
    "$"
);

interned_id!(
    /// Event group identifier. Events sharing a group undo and redo together.
    GroupId,
    "grp_",
    "grp:"
);

interned_id!(
    /// Name of an input or field, unique within its block.
    Name,
    "",
    ""
);
