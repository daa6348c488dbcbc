use nanoid::nanoid;

/// Length of automatically generated short codes.
pub const DEFAULT_CODE_LENGTH: usize = 7;

/// Alphanumeric alphabet for generated codes. Custom codes may additionally
/// contain `-` and `_`, but we never generate those ourselves.
#[rustfmt::skip]
pub const CODE_ALPHABET: [char; 62] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j',
    'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't',
    'u', 'v', 'w', 'x', 'y', 'z',
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J',
    'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T',
    'U', 'V', 'W', 'X', 'Y', 'Z',
];

/// Produces a random candidate code of exactly `length` characters.
///
/// Candidates are drawn uniformly from [`CODE_ALPHABET`]; uniqueness is the
/// caller's problem.
pub fn generate(length: usize) -> String {
    nanoid!(length, &CODE_ALPHABET)
}
