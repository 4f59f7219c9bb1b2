//! MurmurHash2 64 位实现 (MurmurHash64A)
//!
//! 与 NebulaGraph 的 MurmurHash2 保持一致，用于把非整数的点 ID 映射到分区。
//! 结果只依赖输入字节，跨进程重启稳定。

const M: u64 = 0xc6a4a7935bd1e995;
const R: u32 = 47;

/// 路由键哈希使用的默认种子
pub const DEFAULT_SEED: u64 = 0xc70f6907;

/// 计算字节序列的 MurmurHash64A
pub fn murmurhash64a(data: &[u8], seed: u64) -> u64 {
    let mut h: u64 = seed ^ (data.len() as u64).wrapping_mul(M);

    let mut chunks = data.chunks_exact(8);
    for chunk in &mut chunks {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(chunk);
        let mut k = u64::from_le_bytes(buf);
        k = k.wrapping_mul(M);
        k ^= k >> R;
        k = k.wrapping_mul(M);
        h ^= k;
        h = h.wrapping_mul(M);
    }

    // 处理剩余不足 8 字节的部分
    let tail = chunks.remainder();
    if !tail.is_empty() {
        for (i, byte) in tail.iter().enumerate().rev() {
            h ^= (*byte as u64) << (8 * i);
        }
        h = h.wrapping_mul(M);
    }

    h ^= h >> R;
    h = h.wrapping_mul(M);
    h ^ (h >> R)
}

/// 使用默认种子计算哈希
pub fn hash_bytes(data: &[u8]) -> u64 {
    murmurhash64a(data, DEFAULT_SEED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_murmurhash64a_consistency() {
        let data = b"hello world";
        assert_eq!(murmurhash64a(data, 42), murmurhash64a(data, 42));
        assert_eq!(hash_bytes(data), hash_bytes(data));
    }

    #[test]
    fn test_murmurhash64a_different_inputs() {
        assert_ne!(hash_bytes(b"hello world"), hash_bytes(b"hello worle"));
        // 字节顺序敏感
        assert_ne!(hash_bytes(b"ab"), hash_bytes(b"ba"));
    }

    #[test]
    fn test_murmurhash64a_different_seeds() {
        let data = b"vertex-1";
        assert_ne!(murmurhash64a(data, 1), murmurhash64a(data, 2));
    }

    #[test]
    fn test_murmurhash64a_tail_lengths() {
        // 覆盖 0~7 字节尾部以及超过一个块的输入
        let data = b"abcdefghijklmnop";
        let mut seen = std::collections::HashSet::new();
        for len in 0..=data.len() {
            assert!(seen.insert(hash_bytes(&data[..len])), "长度 {} 的哈希重复", len);
        }
    }
}
