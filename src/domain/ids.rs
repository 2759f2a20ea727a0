// Stable identities for model entities. A variable id is the solver column
// number, a constraint id is the solver row number.

macro_rules! define_id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Create an id from a raw index.
            pub fn new(value: u32) -> Self {
                Self(value)
            }

            /// Get the inner u32 value.
            pub fn inner(self) -> u32 {
                self.0
            }

            /// Position in the owning sequence.
            pub fn index(self) -> usize {
                self.0 as usize
            }

            pub(crate) fn from_index(index: usize) -> Self {
                Self(index as u32)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id_type!(VariableId);
define_id_type!(ConstraintId);
define_id_type!(StateHandle);

#[cfg(test)]
mod tests {
    use super::{ConstraintId, VariableId};

    #[test]
    fn variable_id_roundtrip() {
        let id = VariableId::new(7);
        assert_eq!(id.inner(), 7);
        assert_eq!(id.index(), 7);
    }

    #[test]
    fn constraint_id_display() {
        assert_eq!(ConstraintId::new(11).to_string(), "11");
    }
}
