pub trait HasherBase {
    fn update<A: AsRef<[u8]>>(&mut self, data: A) -> &mut Self;
}

pub trait Hasher: HasherBase + Clone + Default {
    fn finalize(self) -> crate::Hash;
    fn reset(&mut self);
    #[inline(always)]
    fn hash<A: AsRef<[u8]>>(data: A) -> crate::Hash {
        let mut hasher = Self::default();
        hasher.update(data);
        hasher.finalize()
    }
}

/// Convenience writers for the fixed-width fields that go into consensus hashes.
pub trait HasherExtensions {
    fn write_u8(&mut self, v: u8) -> &mut Self;
    fn write_u16(&mut self, v: u16) -> &mut Self;
    fn write_u32(&mut self, v: u32) -> &mut Self;
    fn write_u64(&mut self, v: u64) -> &mut Self;
    fn write_bool(&mut self, v: bool) -> &mut Self;
    /// Writes the length as a u64 followed by the bytes
    fn write_var_bytes(&mut self, bytes: &[u8]) -> &mut Self;
    fn write_len(&mut self, len: usize) -> &mut Self;
}

impl<T: HasherBase> HasherExtensions for T {
    #[inline(always)]
    fn write_u8(&mut self, v: u8) -> &mut Self {
        self.update(v.to_le_bytes())
    }
    #[inline(always)]
    fn write_u16(&mut self, v: u16) -> &mut Self {
        self.update(v.to_le_bytes())
    }
    #[inline(always)]
    fn write_u32(&mut self, v: u32) -> &mut Self {
        self.update(v.to_le_bytes())
    }
    #[inline(always)]
    fn write_u64(&mut self, v: u64) -> &mut Self {
        self.update(v.to_le_bytes())
    }
    #[inline(always)]
    fn write_bool(&mut self, v: bool) -> &mut Self {
        self.write_u8(v as u8)
    }
    #[inline(always)]
    fn write_var_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.write_len(bytes.len()).update(bytes)
    }
    #[inline(always)]
    fn write_len(&mut self, len: usize) -> &mut Self {
        self.write_u64(len as u64)
    }
}

blake2b_hasher! {
    struct TransactionHash => b"TransactionHash",
    struct TransactionID => b"TransactionID",
    struct TransactionSigningHash => b"TransactionSigningHash",
    struct BlockHash => b"BlockHash",
    struct MerkleBranchHash => b"MerkleBranchHash",
    struct UtxoCommitmentElement => b"UtxoCommitmentElement",
    struct PruningProofHash => b"PruningProofHash",
}

macro_rules! blake2b_hasher {
    ($(struct $name:ident => $domain_sep:literal),+ $(,)? ) => {$(
        #[derive(Clone)]
        pub struct $name(blake2b_simd::State);

        impl $name {
            #[inline(always)]
            pub fn new() -> Self {
                Self(
                    blake2b_simd::Params::new()
                        .hash_length(32)
                        .key($domain_sep)
                        .to_state(),
                )
            }

            pub fn write<A: AsRef<[u8]>>(&mut self, data: A) {
                self.0.update(data.as_ref());
            }

            #[inline(always)]
            pub fn finalize(self) -> crate::Hash {
                let mut out = [0u8; 32];
                out.copy_from_slice(self.0.finalize().as_bytes());
                crate::Hash(out)
            }
        }
    impl_hasher!{ struct $name }
    )*};
}

macro_rules! impl_hasher {
    (struct $name:ident) => {
        impl HasherBase for $name {
            #[inline(always)]
            fn update<A: AsRef<[u8]>>(&mut self, data: A) -> &mut Self {
                self.write(data);
                self
            }
        }
        impl Hasher for $name {
            #[inline(always)]
            fn finalize(self) -> crate::Hash {
                $name::finalize(self)
            }
            #[inline(always)]
            fn reset(&mut self) {
                *self = Self::new();
            }
        }
        impl Default for $name {
            #[inline(always)]
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

use {blake2b_hasher, impl_hasher};
