use std::{
    fs::File,
    io::{
        stdin,
        stdout,
        BufRead,
        BufWriter,
        Write,
    },
    path::PathBuf,
};

use color_eyre::eyre::Error;
use fstgram::{
    compiler::{
        compile,
        slots::{
            DirectorySlotSource,
            NoSlots,
            SlotSource,
        },
        write_words,
        CompilerParameters,
        DEFAULT_EPS,
        DEFAULT_NUMBER_LANGUAGE,
    },
    decode::{
        decode_line,
        flatten_line,
        Recognition,
    },
    numbers::{
        NumberStyle,
        SpokenNumbers,
    },
    Grammar,
};
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
enum Args {
    /// Compiles sentence files into an FST.
    Compile {
        /// Sentence files.
        #[structopt(short = "f", long = "sentences", required = true)]
        sentences: Vec<PathBuf>,

        /// Directory with slot value files.
        #[structopt(short, long, env = "FSTGRAM_SLOTS_DIR")]
        slots_dir: Option<PathBuf>,

        /// Directory to write the FST, vocabulary and slot values to.
        #[structopt(short, long, env = "FSTGRAM_OUTPUT_DIR")]
        output_dir: PathBuf,

        #[structopt(long, default_value = DEFAULT_NUMBER_LANGUAGE, env = "FSTGRAM_NUMBER_LANGUAGE")]
        number_language: String,

        /// `cardinal` or `digits`
        #[structopt(long, default_value = "cardinal")]
        number_style: NumberStyle,

        #[structopt(long, default_value = DEFAULT_EPS, env = "FSTGRAM_EPS")]
        eps: String,

        #[structopt(long, default_value = "0.0")]
        weight: f64,
    },
    /// Parses sentence files and prints them normalized.
    Check {
        #[structopt(short = "f", long = "sentences", required = true)]
        sentences: Vec<PathBuf>,
    },
    /// Decodes recognizer output read from stdin.
    Decode {
        /// Print only the text, with substitutions applied.
        #[structopt(long)]
        flatten: bool,

        /// Print intent and tagged entities.
        #[structopt(long, conflicts_with = "flatten")]
        entities: bool,
    },
}

impl Args {
    pub fn run(self) -> Result<(), Error> {
        match self {
            Self::Compile {
                sentences,
                slots_dir,
                output_dir,
                number_language,
                number_style,
                eps,
                weight,
            } => {
                let grammar = Grammar::from_files(&sentences)?;

                let slots: Box<dyn SlotSource> = match slots_dir {
                    Some(dir) => Box::new(DirectorySlotSource::new(dir)),
                    None => Box::new(NoSlots),
                };
                let numbers = SpokenNumbers::new(number_style);

                std::fs::create_dir_all(&output_dir)?;
                let parameters = CompilerParameters {
                    eps,
                    number_language,
                    weight,
                    slots_output_dir: Some(output_dir.join("slots")),
                };

                let fst_path = output_dir.join("graph.fst.txt");
                tracing::info!(path = %fst_path.display(), "writing fst");
                let writer = BufWriter::new(File::create(&fst_path)?);

                let compiled = compile(&grammar, slots.as_ref(), &numbers, parameters, writer)?;

                write_words(
                    BufWriter::new(File::create(output_dir.join("vocabulary.txt"))?),
                    &compiled.vocabulary,
                )?;
                write_words(
                    BufWriter::new(File::create(output_dir.join("output_words.txt"))?),
                    &compiled.output_words,
                )?;

                println!(
                    "{} states, {} arcs, {} words, {} slots",
                    compiled.num_states,
                    compiled.num_arcs,
                    compiled.vocabulary.len(),
                    compiled.used_slots.len()
                );
            }
            Self::Check { sentences } => {
                let grammar = Grammar::from_files(&sentences)?;

                let mut stdout = stdout().lock();
                for intent in &grammar.intents {
                    writeln!(stdout, "[{}]", intent.name)?;
                    for rule in intent.rules.values() {
                        writeln!(stdout, "{} = {}", rule.rule_name, rule.body)?;
                    }
                    for sentence in &intent.sentences {
                        let sentence = sentence.to_string();
                        // would be read as a section header otherwise
                        if sentence.starts_with('[') {
                            write!(stdout, "\\")?;
                        }
                        writeln!(stdout, "{sentence}")?;
                    }
                    writeln!(stdout)?;
                }
            }
            Self::Decode { flatten, entities } => {
                let mut stdout = stdout().lock();

                for line in stdin().lock().lines() {
                    let line = line?;
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }

                    if flatten {
                        writeln!(stdout, "{}", flatten_line(line)?)?;
                    }
                    else if entities {
                        let recognition = Recognition::from_line(line)?;
                        writeln!(
                            stdout,
                            "{}: {}",
                            recognition.intent.as_deref().unwrap_or("-"),
                            recognition.text
                        )?;
                        for entity in &recognition.entities {
                            writeln!(
                                stdout,
                                "  {} = {} ({})",
                                entity.name, entity.value, entity.raw_value
                            )?;
                        }
                    }
                    else {
                        writeln!(stdout, "{}", decode_line(line)?)?;
                    }
                }
            }
        }

        Ok(())
    }
}

fn main() -> Result<(), Error> {
    dotenvy::dotenv().ok();
    color_eyre::install()?;
    tracing_subscriber::fmt::init();

    let args = Args::from_args();
    args.run()?;

    Ok(())
}
