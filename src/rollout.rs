use md5::{Digest, Md5};

use crate::vars::Vars;

/// Number of rollout buckets; a bucket is always in `0..BUCKET_COUNT`.
pub const BUCKET_COUNT: u64 = 100;

/// Builds the string that a request is bucketed by: `"{field}={value};"` for every field in order,
/// with an empty value for fields the request did not supply.
pub fn bucket_key(fields: &[String], vars: &Vars) -> String {
    let mut key = String::new();
    for field in fields {
        key.push_str(field);
        key.push('=');
        if let Some(value) = vars.get(field) {
            key.push_str(value);
        }
        key.push(';');
    }
    key
}

/// Computes the rollout bucket of `vars` for the given fields.
///
/// The key from [bucket_key] is hashed with MD5; the first eight bytes of the digest are read as a
/// big-endian integer and reduced modulo [BUCKET_COUNT]. Identical field values therefore always
/// land in the same bucket, whichever process computes it.
pub fn bucket(fields: &[String], vars: &Vars) -> u8 {
    bucket_for_key(&bucket_key(fields, vars))
}

pub(crate) fn bucket_for_key(key: &str) -> u8 {
    let digest = Md5::digest(key.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    let numhash = u64::from_be_bytes(head);

    // always < 100, so the narrowing cannot truncate
    (numhash % BUCKET_COUNT) as u8
}
