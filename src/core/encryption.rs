//! Standard security handler state.
//!
//! Parses the /Encrypt dictionary, validates passwords, derives the file
//! key, and decrypts strings and stream bodies. The state machine is
//! deliberately simple: a document with an /Encrypt dictionary starts
//! *locked*; `unlock` may be called any number of times with different
//! passwords, and the first success freezes the derived key for the
//! document's lifetime.

use crate::core::crypto::{
    self, decode_owner_password, legacy_file_key, legacy_user_check, revision5_hash,
    revision6_hash, Aes,
};
use crate::core::error::{PdfError, PdfResult};
use crate::core::parser::{Dict, Object, ObjectRef};

/// Cipher selected by the /Encrypt dictionary for strings and streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherKind {
    Rc4,
    Aes128,
    Aes256,
    /// /CFM /None or an unrecognized crypt filter: data passes through.
    Identity,
}

/// Document permission bits from /P.
#[derive(Debug, Clone, Copy)]
pub struct Permissions {
    pub print: bool,
    pub modify: bool,
    pub copy: bool,
    pub annotate: bool,
    pub fill_forms: bool,
    pub extract_accessible: bool,
    pub assemble: bool,
    pub print_high_quality: bool,
    pub raw: u32,
}

impl Permissions {
    pub fn from_p(p: u32) -> Self {
        Permissions {
            print: p & 0x0004 != 0,
            modify: p & 0x0008 != 0,
            copy: p & 0x0010 != 0,
            annotate: p & 0x0020 != 0,
            fill_forms: p & 0x0100 != 0,
            extract_accessible: p & 0x0200 != 0,
            assemble: p & 0x0400 != 0,
            print_high_quality: p & 0x0800 != 0,
            raw: p,
        }
    }
}

/// Parsed /Encrypt parameters plus the derived file key once unlocked.
#[derive(Debug, Clone)]
pub struct EncryptionState {
    pub version: i32,
    pub revision: i32,
    pub permissions: Permissions,
    pub encrypt_metadata: bool,
    o: Vec<u8>,
    u: Vec<u8>,
    oe: Option<Vec<u8>>,
    ue: Option<Vec<u8>>,
    /// First element of the trailer /ID, used by legacy key derivation.
    file_id: Vec<u8>,
    /// Key length in bytes.
    key_length: usize,
    cipher: CipherKind,
    /// The /Encrypt dictionary's own object, never decrypted.
    encrypt_ref: Option<ObjectRef>,
    file_key: Option<Vec<u8>>,
}

impl EncryptionState {
    /// Parses the /Encrypt dictionary. Only the standard security handler
    /// is supported; anything else is reported as corrupt rather than
    /// silently producing garbage.
    pub fn from_dict(
        dict: &Dict,
        file_id: Vec<u8>,
        encrypt_ref: Option<ObjectRef>,
    ) -> PdfResult<Self> {
        let filter = dict
            .get("Filter")
            .and_then(Object::as_name)
            .unwrap_or_default();
        if filter != "Standard" {
            return Err(PdfError::corrupt(format!(
                "unsupported security handler /{filter}"
            )));
        }

        let version = dict.get("V").and_then(Object::as_int).unwrap_or(0) as i32;
        let revision = dict.get("R").and_then(Object::as_int).unwrap_or(0) as i32;

        let o = dict
            .get("O")
            .and_then(Object::as_string_bytes)
            .ok_or_else(|| PdfError::corrupt("encrypt dictionary missing /O"))?
            .to_vec();
        let u = dict
            .get("U")
            .and_then(Object::as_string_bytes)
            .ok_or_else(|| PdfError::corrupt("encrypt dictionary missing /U"))?
            .to_vec();
        let p = dict.get("P").and_then(Object::as_int).unwrap_or(-4) as i64 as u32;

        let oe = dict
            .get("OE")
            .and_then(Object::as_string_bytes)
            .map(<[u8]>::to_vec);
        let ue = dict
            .get("UE")
            .and_then(Object::as_string_bytes)
            .map(<[u8]>::to_vec);

        let encrypt_metadata = dict
            .get("EncryptMetadata")
            .and_then(Object::as_bool)
            .unwrap_or(true);

        // /Length is in bits for V2+; V1 is fixed 40-bit.
        let length_bits = dict.get("Length").and_then(Object::as_int).unwrap_or(40);

        let (cipher, key_length) = match version {
            1 => (CipherKind::Rc4, 5),
            2 => (CipherKind::Rc4, ((length_bits.clamp(40, 128)) / 8) as usize),
            4 | 5 => {
                let kind = Self::stdcf_cipher(dict, version);
                let len = if version == 5 { 32 } else { 16 };
                (kind, len)
            }
            other => {
                return Err(PdfError::corrupt(format!(
                    "unsupported encryption version V={other}"
                )));
            }
        };

        Ok(EncryptionState {
            version,
            revision,
            permissions: Permissions::from_p(p),
            encrypt_metadata,
            o,
            u,
            oe,
            ue,
            file_id,
            key_length,
            cipher,
            encrypt_ref,
            file_key: None,
        })
    }

    /// Resolves /CF → /StdCF → /CFM for V4/V5 dictionaries.
    fn stdcf_cipher(dict: &Dict, version: i32) -> CipherKind {
        let cfm = dict
            .get("CF")
            .and_then(Object::as_dict)
            .and_then(|cf| cf.get("StdCF"))
            .and_then(Object::as_dict)
            .and_then(|stdcf| stdcf.get("CFM"))
            .and_then(Object::as_name);

        match cfm {
            Some("AESV2") => CipherKind::Aes128,
            Some("AESV3") => CipherKind::Aes256,
            Some("V2") => CipherKind::Rc4,
            Some("None") => CipherKind::Identity,
            Some(other) => {
                log::warn!("unknown crypt filter method {other}, treating as identity");
                CipherKind::Identity
            }
            // No /CF: V5 means AES-256, V4 falls back to RC4.
            None if version == 5 => CipherKind::Aes256,
            None => CipherKind::Rc4,
        }
    }

    pub fn is_unlocked(&self) -> bool {
        self.file_key.is_some()
    }

    pub fn encrypt_ref(&self) -> Option<ObjectRef> {
        self.encrypt_ref
    }

    /// Attempts to validate `password` and derive the file key.
    ///
    /// Both user and owner passwords are accepted. Succeeding again on an
    /// already-unlocked state is a no-op; the first derived key is final.
    pub fn unlock(&mut self, password: &[u8]) -> PdfResult<()> {
        if self.file_key.is_some() {
            return Ok(());
        }

        let key = match self.revision {
            2 | 3 | 4 => self.unlock_legacy(password),
            5 | 6 => self.unlock_aes256(password),
            other => {
                return Err(PdfError::corrupt(format!(
                    "unsupported security handler revision R={other}"
                )));
            }
        };

        match key {
            Some(key) => {
                self.file_key = Some(key);
                Ok(())
            }
            None => Err(PdfError::InvalidPassword),
        }
    }

    fn unlock_legacy(&self, password: &[u8]) -> Option<Vec<u8>> {
        // Try as user password first.
        if let Some(key) = self.check_legacy_user(password) {
            return Some(key);
        }
        // Then as owner password: decode the user password out of /O and
        // re-validate.
        let decoded = decode_owner_password(password, &self.o, self.revision, self.key_length);
        self.check_legacy_user(&decoded)
    }

    fn check_legacy_user(&self, password: &[u8]) -> Option<Vec<u8>> {
        let key = legacy_file_key(
            password,
            &self.o,
            self.permissions.raw,
            &self.file_id,
            self.revision,
            self.key_length,
            self.encrypt_metadata,
        );
        let check = legacy_user_check(&key, &self.file_id, self.revision);
        let matches = if self.revision == 2 {
            self.u.len() >= 32 && self.u[..32] == check[..32]
        } else {
            self.u.len() >= 16 && self.u[..16] == check[..16]
        };
        matches.then_some(key)
    }

    fn unlock_aes256(&self, password: &[u8]) -> Option<Vec<u8>> {
        if self.o.len() < 48 || self.u.len() < 48 {
            return None;
        }
        // Passwords are UTF-8, truncated to 127 bytes.
        let password = &password[..password.len().min(127)];

        let hash = |pw: &[u8], salt: &[u8], udata: &[u8]| -> [u8; 32] {
            if self.revision == 6 {
                revision6_hash(pw, salt, udata)
            } else {
                revision5_hash(pw, salt, udata)
            }
        };

        // User password: validation salt at U[32..40], key salt at U[40..48].
        if hash(password, &self.u[32..40], &[])[..] == self.u[..32] {
            let ue = self.ue.as_deref()?;
            let intermediate = hash(password, &self.u[40..48], &[]);
            let aes = Aes::new(&intermediate);
            let key = aes.cbc_decrypt_no_padding(&[0u8; 16], ue);
            return (key.len() >= 32).then(|| key[..32].to_vec());
        }

        // Owner password: salts in /O, hashed together with U[0..48].
        if hash(password, &self.o[32..40], &self.u[..48])[..] == self.o[..32] {
            let oe = self.oe.as_deref()?;
            let intermediate = hash(password, &self.o[40..48], &self.u[..48]);
            let aes = Aes::new(&intermediate);
            let key = aes.cbc_decrypt_no_padding(&[0u8; 16], oe);
            return (key.len() >= 32).then(|| key[..32].to_vec());
        }

        None
    }

    /// Per-object key for legacy (pre-AES-256) encryption:
    /// MD5(file_key + objnum[0..3] + gen[0..2] [+ "sAlT" for AES]).
    fn object_key(&self, r: ObjectRef) -> Vec<u8> {
        let file_key = self.file_key.as_deref().unwrap_or_default();
        let mut input = Vec::with_capacity(file_key.len() + 9);
        input.extend_from_slice(file_key);
        input.extend_from_slice(&r.num.to_le_bytes()[..3]);
        input.extend_from_slice(&r.gen.to_le_bytes()[..2]);
        if self.cipher == CipherKind::Aes128 {
            input.extend_from_slice(b"sAlT");
        }
        let hash = crypto::md5(&input);
        let len = (file_key.len() + 5).min(16);
        hash[..len].to_vec()
    }

    fn decrypt(&self, data: &[u8], r: ObjectRef) -> Vec<u8> {
        if self.file_key.is_none() {
            // Locked documents never reach here; fetches are gated upstream.
            return data.to_vec();
        }
        if Some(r) == self.encrypt_ref {
            return data.to_vec();
        }

        match self.cipher {
            CipherKind::Identity => data.to_vec(),
            CipherKind::Rc4 => crypto::rc4(&self.object_key(r), data),
            CipherKind::Aes128 => {
                if data.len() < 16 {
                    return Vec::new();
                }
                let key = self.object_key(r);
                let aes = Aes::new(&key);
                let mut iv = [0u8; 16];
                iv.copy_from_slice(&data[..16]);
                aes.cbc_decrypt(&iv, &data[16..])
            }
            CipherKind::Aes256 => {
                if data.len() < 16 {
                    return Vec::new();
                }
                let key = self.file_key.as_deref().unwrap_or_default();
                let aes = Aes::new(key);
                let mut iv = [0u8; 16];
                iv.copy_from_slice(&data[..16]);
                aes.cbc_decrypt(&iv, &data[16..])
            }
        }
    }

    /// Decrypts a string value belonging to object `r`.
    pub fn decrypt_string(&self, data: &[u8], r: ObjectRef) -> Vec<u8> {
        self.decrypt(data, r)
    }

    /// Decrypts a stream body belonging to object `r`.
    pub fn decrypt_stream(&self, data: &[u8], r: ObjectRef) -> Vec<u8> {
        self.decrypt(data, r)
    }
}
