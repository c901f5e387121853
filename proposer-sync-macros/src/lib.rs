
use proc_macro::TokenStream;

/// Runs the test once per RNG seed, passing a `rand_chacha::ChaCha8Rng` seeded from it.
///
/// Attributes:
/// * samples: the number of seeds to run when `PS_TEST_SAMPLES` is not set (default 1)
#[proc_macro_attribute]
pub fn test(args: TokenStream, item: TokenStream) -> TokenStream {
    test::test_macro(args.into(), item.into()).into()
}
