//! Maps a k-mer to the bin it belongs in (component C3): compute its
//! signature ([`super::signature::get_signature`]), then fold that
//! signature down to a bin index.

use super::kmer::Kmer;
use super::metadata::{SignatureSelectionScheme, SignatureToBinMapping};
use super::signature::get_signature;

/// `signature % num_bins`, the only implemented [`SignatureToBinMapping`].
pub fn signature_to_bin_id(signature: u64, num_bins: u64, mapping: SignatureToBinMapping) -> u64 {
    match mapping {
        SignatureToBinMapping::Modulo => signature % num_bins,
    }
}

/// End-to-end: k-mer -> signature -> bin index.
pub fn get_bin_id(
    kmer: &Kmer,
    kmer_len: u64,
    signature_len: u32,
    num_bins: u64,
    scheme: SignatureSelectionScheme,
    mapping: SignatureToBinMapping,
) -> u64 {
    let signature = match scheme {
        SignatureSelectionScheme::MinHash => get_signature(kmer, kmer_len, signature_len),
    };
    signature_to_bin_id(signature, num_bins, mapping)
}
