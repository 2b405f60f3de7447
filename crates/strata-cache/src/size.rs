use std::collections::BTreeMap;
use std::mem::size_of;
use std::sync::Arc;

/// Approximate heap + inline footprint of a cached payload, in bytes.
///
/// Estimates only need to be stable and roughly proportional to real usage;
/// the cache clamps them into its own bounds anyway.
pub trait SizeEstimable {
    fn estimated_size_bytes(&self) -> u64;
}

macro_rules! inline_size {
    ($($ty:ty),* $(,)?) => {
        $(
            impl SizeEstimable for $ty {
                fn estimated_size_bytes(&self) -> u64 {
                    size_of::<$ty>() as u64
                }
            }
        )*
    };
}

inline_size!(bool, char, u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, f32, f64);

impl SizeEstimable for str {
    fn estimated_size_bytes(&self) -> u64 {
        self.len() as u64
    }
}

impl SizeEstimable for String {
    fn estimated_size_bytes(&self) -> u64 {
        (size_of::<String>() + self.capacity()) as u64
    }
}

impl<T: SizeEstimable> SizeEstimable for [T] {
    fn estimated_size_bytes(&self) -> u64 {
        self.iter().map(SizeEstimable::estimated_size_bytes).sum()
    }
}

impl<T: SizeEstimable> SizeEstimable for Vec<T> {
    fn estimated_size_bytes(&self) -> u64 {
        let spare = self.capacity().saturating_sub(self.len()) * size_of::<T>();
        (size_of::<Vec<T>>() + spare) as u64 + self.as_slice().estimated_size_bytes()
    }
}

impl<T: SizeEstimable> SizeEstimable for Option<T> {
    fn estimated_size_bytes(&self) -> u64 {
        match self {
            Some(value) => value.estimated_size_bytes(),
            None => size_of::<Option<T>>() as u64,
        }
    }
}

impl<T: SizeEstimable + ?Sized> SizeEstimable for Box<T> {
    fn estimated_size_bytes(&self) -> u64 {
        size_of::<usize>() as u64 + (**self).estimated_size_bytes()
    }
}

impl<T: SizeEstimable + ?Sized> SizeEstimable for Arc<T> {
    fn estimated_size_bytes(&self) -> u64 {
        2 * size_of::<usize>() as u64 + (**self).estimated_size_bytes()
    }
}

impl<K: SizeEstimable, V: SizeEstimable> SizeEstimable for BTreeMap<K, V> {
    fn estimated_size_bytes(&self) -> u64 {
        size_of::<BTreeMap<K, V>>() as u64
            + self
                .iter()
                .map(|(k, v)| k.estimated_size_bytes() + v.estimated_size_bytes())
                .sum::<u64>()
    }
}

impl<A: SizeEstimable, B: SizeEstimable> SizeEstimable for (A, B) {
    fn estimated_size_bytes(&self) -> u64 {
        self.0.estimated_size_bytes() + self.1.estimated_size_bytes()
    }
}
