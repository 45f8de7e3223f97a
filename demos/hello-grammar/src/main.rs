//! Compiles a small grammar in memory, prints the acceptor and decodes a
//! line as a recognizer would output it.

use color_eyre::eyre::Error;
use fstgram::{
    compiler::{
        compile,
        markers::Marker,
        slots::MemorySlotSource,
    },
    decode::Recognition,
    numbers::SpokenNumbers,
    Grammar,
};

const SENTENCES: &str = r#"
[SetLight]
light_name = (living room | kitchen){name}
set [the] <light_name> light to ($color){color}
turn (on | off){state} the <light_name> light

[SetTimer]
set a timer for (1..10){minutes} (minute | minutes)
"#;

fn main() -> Result<(), Error> {
    // initialize error handling and logging.
    dotenvy::dotenv().ok();
    color_eyre::install()?;
    tracing_subscriber::fmt::init();

    let grammar = Grammar::parse_str(SENTENCES, "hello.ini")?;
    let slots = MemorySlotSource::default().with("color", "red\ngreen\nnavy blue:blue\n");

    let mut fst = vec![];
    let compiled = compile(
        &grammar,
        &slots,
        &SpokenNumbers::default(),
        Default::default(),
        &mut fst,
    )?;

    println!("{}", String::from_utf8_lossy(&fst));
    println!(
        "{} states, {} arcs",
        compiled.num_states, compiled.num_arcs
    );
    println!(
        "vocabulary: {}",
        compiled.vocabulary.iter().cloned().collect::<Vec<_>>().join(" ")
    );

    // what a recognizer would output for "turn off the kitchen light"
    let line = [
        Marker::Intent {
            name: "SetLight".to_owned(),
        }
        .encode(),
        "turn".to_owned(),
        Marker::Tag {
            name: "state".to_owned(),
        }
        .encode(),
        "off".to_owned(),
        Marker::TagEnd.encode(),
        "the".to_owned(),
        Marker::Tag {
            name: "name".to_owned(),
        }
        .encode(),
        "kitchen".to_owned(),
        Marker::TagEnd.encode(),
        "light".to_owned(),
        Marker::IntentEnd.encode(),
    ]
    .join(" ");

    let recognition = Recognition::from_line(&line)?;
    println!("{recognition:#?}");

    Ok(())
}
