use aes::Aes256;
use cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};
use sha2::{Digest, Sha256};

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// 按绝对偏移定位的流式解密器。
///
/// CTR 模式下密钥流只由 (key, iv, offset) 决定，每个分块各自
/// 实例化一个解密器即可并行解密，互相之间没有共享状态。
/// 未配置口令时为恒等变换。
pub struct ChunkDecryptor(Option<Aes256Ctr>);

impl ChunkDecryptor {
    /// `offset` 是该分块在整个文件中的起始字节偏移
    pub fn new(password: Option<&str>, offset: u64) -> Self {
        let Some(password) = password else {
            return Self(None);
        };

        let key = derive_key(password.as_bytes());
        let iv = derive_iv(password.as_bytes());
        let mut cipher = Aes256Ctr::new(&key.into(), &iv.into());
        cipher.seek(offset);
        Self(Some(cipher))
    }

    /// 就地解密一段网络数据，随到随解，不要求整块缓冲
    pub fn apply(&mut self, buf: &mut [u8]) {
        if let Some(cipher) = &mut self.0 {
            cipher.apply_keystream(buf);
        }
    }
}

fn derive_key(password: &[u8]) -> [u8; 32] {
    Sha256::digest(password).into()
}

fn derive_iv(password: &[u8]) -> [u8; 16] {
    let mut hasher = Sha256::new();
    hasher.update(b"pcsdl-iv");
    hasher.update(password);
    let digest = hasher.finalize();
    let mut iv = [0u8; 16];
    iv.copy_from_slice(&digest[..16]);
    iv
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_per_block() {
        let plaintext: Vec<u8> = (0..1024u32).map(|i| (i % 251) as u8).collect();

        // 整体加密一次（CTR 下加解密同构）
        let mut ciphertext = plaintext.clone();
        ChunkDecryptor::new(Some("秘密口令"), 0).apply(&mut ciphertext);
        assert_ne!(ciphertext, plaintext);

        // 任意切块、各自按偏移独立解密，结果逐字节一致
        for chunk_size in [16usize, 100, 333, 1024] {
            let mut recovered = ciphertext.clone();
            for (i, block) in recovered.chunks_mut(chunk_size).enumerate() {
                let offset = (i * chunk_size) as u64;
                ChunkDecryptor::new(Some("秘密口令"), offset).apply(block);
            }
            assert_eq!(recovered, plaintext, "chunk_size={}", chunk_size);
        }
    }

    #[test]
    fn test_incremental_matches_whole() {
        let plaintext = vec![7u8; 4096];
        let mut whole = plaintext.clone();
        ChunkDecryptor::new(Some("pw"), 64).apply(&mut whole);

        // 同一分块内逐段喂入，等价于一次性处理
        let mut incremental = plaintext.clone();
        let mut dec = ChunkDecryptor::new(Some("pw"), 64);
        for part in incremental.chunks_mut(129) {
            dec.apply(part);
        }
        assert_eq!(incremental, whole);
    }

    #[test]
    fn test_no_password_is_identity() {
        let mut buf = vec![1u8, 2, 3, 4];
        ChunkDecryptor::new(None, 42).apply(&mut buf);
        assert_eq!(buf, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_wrong_password_differs() {
        let mut buf = vec![0u8; 64];
        ChunkDecryptor::new(Some("a"), 0).apply(&mut buf);
        let mut buf2 = vec![0u8; 64];
        ChunkDecryptor::new(Some("b"), 0).apply(&mut buf2);
        assert_ne!(buf, buf2);
    }
}
