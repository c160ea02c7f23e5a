//! Macros for thin newtype wrappers.

/// Implement conversions and transparent access for a newtype `$name { inner: $type }`.
///
/// Generates [From], [Deref](core::ops::Deref), [DerefMut](core::ops::DerefMut) and the
/// const constructors `from_const` / `into_const`.
#[macro_export]
macro_rules! impl_basic {
    ($name: ident, $type: ty) => {
        impl core::convert::From<$type> for $name {
            fn from(value: $type) -> Self {
                $name { inner: value }
            }
        }

        impl core::ops::Deref for $name {
            type Target = $type;

            fn deref(&self) -> &Self::Target {
                &self.inner
            }
        }

        impl core::ops::DerefMut for $name {
            fn deref_mut(&mut self) -> &mut Self::Target {
                &mut self.inner
            }
        }

        impl $name {
            pub const fn from_const(value: $type) -> Self {
                $name { inner: value }
            }
            pub fn into_inner(self) -> $type {
                self.inner
            }
        }
    };
}

#[cfg(test)]
mod tests {
    struct Wrapped {
        inner: u32,
    }
    impl_basic!(Wrapped, u32);

    #[test]
    fn wrapper_derefs_to_inner() {
        let mut w = Wrapped::from(7);
        assert_eq!(*w, 7);
        *w += 1;
        assert_eq!(w.into_inner(), 8);
    }

    #[test]
    fn const_constructor() {
        const W: Wrapped = Wrapped::from_const(3);
        assert_eq!(*W, 3);
    }
}
