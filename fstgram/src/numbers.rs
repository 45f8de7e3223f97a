//! Spoken forms of integers.
//!
//! Numbers in templates (`5`, `1..10`) are recognized as the words a speaker
//! would say for them.

use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported number language: {0}")]
    UnsupportedLanguage(String),

    #[error("unknown number style: {0}")]
    UnknownStyle(String),
}

/// Converts integers into words.
pub trait NumberToWords {
    fn to_words(&self, number: i64, language: &str) -> Result<Vec<String>, Error>;
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum NumberStyle {
    /// `123` is "one hundred twenty three"
    #[default]
    Cardinal,
    /// `123` is "one two three"
    Digits,
}

impl FromStr for NumberStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cardinal" => Ok(Self::Cardinal),
            "digits" => Ok(Self::Digits),
            _ => Err(Error::UnknownStyle(s.to_owned())),
        }
    }
}

/// The built-in converter. Only English is supported.
#[derive(Copy, Clone, Debug, Default)]
pub struct SpokenNumbers {
    pub style: NumberStyle,
}

impl SpokenNumbers {
    pub fn new(style: NumberStyle) -> Self {
        Self { style }
    }
}

impl NumberToWords for SpokenNumbers {
    fn to_words(&self, number: i64, language: &str) -> Result<Vec<String>, Error> {
        if !is_english(language) {
            return Err(Error::UnsupportedLanguage(language.to_owned()));
        }

        Ok(english_words(number, self.style)
            .into_iter()
            .map(ToOwned::to_owned)
            .collect())
    }
}

/// Accepts `en`, `en-US`, `en_GB` and so on.
fn is_english(language: &str) -> bool {
    let primary = language.split(['-', '_']).next().unwrap_or_default();
    primary.eq_ignore_ascii_case("en")
}

const SMALL: [&str; 20] = [
    "zero",
    "one",
    "two",
    "three",
    "four",
    "five",
    "six",
    "seven",
    "eight",
    "nine",
    "ten",
    "eleven",
    "twelve",
    "thirteen",
    "fourteen",
    "fifteen",
    "sixteen",
    "seventeen",
    "eighteen",
    "nineteen",
];

const TENS: [&str; 10] = [
    "", "", "twenty", "thirty", "forty", "fifty", "sixty", "seventy", "eighty", "ninety",
];

const SCALES: [(u64, &str); 7] = [
    (100, "hundred"),
    (1_000, "thousand"),
    (1_000_000, "million"),
    (1_000_000_000, "billion"),
    (1_000_000_000_000, "trillion"),
    (1_000_000_000_000_000, "quadrillion"),
    (1_000_000_000_000_000_000, "quintillion"),
];

pub fn english_words(number: i64, style: NumberStyle) -> Vec<&'static str> {
    let mut words = vec![];

    if number < 0 {
        words.push("minus");
    }

    let magnitude = number.unsigned_abs();
    match style {
        NumberStyle::Cardinal => push_cardinal(magnitude, &mut words),
        NumberStyle::Digits => push_digits(magnitude, &mut words),
    }

    words
}

fn push_cardinal(number: u64, words: &mut Vec<&'static str>) {
    if number < 20 {
        words.push(SMALL[number as usize]);
        return;
    }

    if number < 100 {
        words.push(TENS[(number / 10) as usize]);
        if number % 10 != 0 {
            words.push(SMALL[(number % 10) as usize]);
        }
        return;
    }

    // largest scale that fits, e.g. 1000 for 12345
    let (base, name) = SCALES
        .iter()
        .rev()
        .find(|(base, _)| *base <= number)
        .copied()
        .unwrap_or(SCALES[0]);

    push_cardinal(number / base, words);
    words.push(name);

    let rest = number % base;
    if rest != 0 {
        push_cardinal(rest, words);
    }
}

fn push_digits(number: u64, words: &mut Vec<&'static str>) {
    for digit in number.to_string().bytes() {
        words.push(SMALL[(digit - b'0') as usize]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cardinal(number: i64) -> String {
        english_words(number, NumberStyle::Cardinal).join(" ")
    }

    #[test]
    fn it_says_small_numbers() {
        assert_eq!(cardinal(0), "zero");
        assert_eq!(cardinal(7), "seven");
        assert_eq!(cardinal(13), "thirteen");
        assert_eq!(cardinal(20), "twenty");
        assert_eq!(cardinal(42), "forty two");
        assert_eq!(cardinal(99), "ninety nine");
    }

    #[test]
    fn it_says_large_numbers() {
        assert_eq!(cardinal(100), "one hundred");
        assert_eq!(cardinal(101), "one hundred one");
        assert_eq!(cardinal(250), "two hundred fifty");
        assert_eq!(cardinal(1000), "one thousand");
        assert_eq!(cardinal(1999), "one thousand nine hundred ninety nine");
        assert_eq!(cardinal(12_345), "twelve thousand three hundred forty five");
        assert_eq!(cardinal(2_000_001), "two million one");
        assert_eq!(
            cardinal(i64::MAX),
            "nine quintillion two hundred twenty three quadrillion three hundred seventy two \
             trillion thirty six billion eight hundred fifty four million seven hundred seventy \
             five thousand eight hundred seven"
        );
    }

    #[test]
    fn it_says_negative_numbers() {
        assert_eq!(cardinal(-5), "minus five");
        assert!(cardinal(i64::MIN).starts_with("minus nine quintillion"));
    }

    #[test]
    fn it_says_digits() {
        assert_eq!(
            english_words(1024, NumberStyle::Digits).join(" "),
            "one zero two four"
        );
        assert_eq!(english_words(-7, NumberStyle::Digits).join(" "), "minus seven");
    }

    #[test]
    fn it_checks_the_language() {
        let numbers = SpokenNumbers::default();
        assert_eq!(numbers.to_words(3, "en").unwrap(), vec!["three"]);
        assert_eq!(numbers.to_words(3, "en-US").unwrap(), vec!["three"]);
        assert!(matches!(
            numbers.to_words(3, "de"),
            Err(Error::UnsupportedLanguage(_))
        ));
    }

    #[test]
    fn it_parses_styles() {
        assert_eq!("digits".parse::<NumberStyle>().unwrap(), NumberStyle::Digits);
        assert!("roman".parse::<NumberStyle>().is_err());
    }
}
