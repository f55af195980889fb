//! Proptest generators for property-based testing.

use proptest::prelude::*;

use iryshare_access::LocalWallet;
use iryshare_core::Address;

/// Generate a random wallet.
pub fn wallet() -> impl Strategy<Value = LocalWallet> {
    any::<[u8; 32]>().prop_map(LocalWallet::from_seed)
}

/// Generate a random 20-byte address.
pub fn address() -> impl Strategy<Value = Address> {
    any::<[u8; 20]>().prop_map(|bytes| Address::from_bytes(&bytes))
}

/// Generate an address as a user might type it: any case, maybe padded.
pub fn typed_address() -> impl Strategy<Value = String> {
    (any::<[u8; 20]>(), any::<bool>(), " {0,2}").prop_map(|(bytes, upper, pad)| {
        let digits = hex::encode(bytes);
        let digits = if upper { digits.to_ascii_uppercase() } else { digits };
        format!("{pad}0x{digits}{pad}")
    })
}

/// Generate a recipient list, possibly with duplicates.
pub fn recipients(max_len: usize) -> impl Strategy<Value = Vec<Address>> {
    prop::collection::vec(address(), 0..=max_len).prop_flat_map(|list| {
        let len = list.len();
        (Just(list), prop::collection::vec(any::<prop::sample::Index>(), 0..=len))
    })
    .prop_map(|(mut list, repeats)| {
        if !list.is_empty() {
            let picks: Vec<Address> = repeats.iter().map(|i| i.get(&list).clone()).collect();
            list.extend(picks);
        }
        list
    })
}

/// Generate a valid username.
pub fn username() -> impl Strategy<Value = String> {
    "[a-z0-9_][a-z0-9_.-]{0,31}".prop_map(String::from)
}

/// Generate payload bytes of specified max length.
pub fn payload(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate a file name with an extension.
pub fn file_name() -> impl Strategy<Value = String> {
    ("[a-zA-Z0-9 _-]{1,24}", "(txt|pdf|png|json|csv)").prop_map(|(stem, ext)| format!("{stem}.{ext}"))
}

/// Generate a MIME type.
pub fn content_type() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("text/plain".to_string()),
        Just("application/pdf".to_string()),
        Just("image/png".to_string()),
        Just("application/octet-stream".to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use iryshare_core::normalize_recipients;

    proptest! {
        #[test]
        fn typed_addresses_parse(input in typed_address()) {
            let parsed = Address::parse(&input).unwrap();
            prop_assert_eq!(parsed.as_str(), input.trim().to_ascii_lowercase());
        }

        #[test]
        fn recipients_normalize_without_duplicates(owner in address(), list in recipients(6)) {
            let normalized = normalize_recipients(list, &owner);
            let mut deduped = normalized.clone();
            deduped.sort();
            deduped.dedup();
            prop_assert_eq!(deduped.len(), normalized.len());
        }
    }
}
