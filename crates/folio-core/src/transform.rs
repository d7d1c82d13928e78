//! CSV to play-hierarchy conversion.
//!
//! The source is a flat export with one spoken line per record:
//! `index, play_name, genre, character, act, scene, sentence, text, sex`.
//! The first record is always a header. Records that are short, or whose
//! index/act/scene/sentence does not read as a finite number, are dropped
//! without failing the run; only a missing source file is fatal. An empty
//! numeric field reads as zero.

use crate::model::{Act, CharacterSummary, Corpus, Line, Ordinal, Play, Scene};
use crate::text_utils::{collate, slugify};
use anyhow::{Context, Result, anyhow};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const COLUMN_COUNT: usize = 9;
const RADIX_PREFIXES: [(&str, u32); 6] = [
    ("0x", 16),
    ("0X", 16),
    ("0o", 8),
    ("0O", 8),
    ("0b", 2),
    ("0B", 2),
];

/// One validated source record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvRow {
    pub index: Ordinal,
    pub play_name: String,
    pub genre: String,
    pub character: String,
    pub act: Ordinal,
    pub scene: Ordinal,
    pub sentence: Ordinal,
    pub text: String,
    pub sex: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowRejection {
    Short,
    NonNumeric,
}

/// Counters describing a conversion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversionReport {
    pub records_read: usize,
    pub rows_kept: usize,
    pub dropped_short: usize,
    pub dropped_non_numeric: usize,
    pub dropped_unreadable: usize,
    pub plays: usize,
    pub lines: usize,
    pub slug_collisions: usize,
}

impl ConversionReport {
    pub fn dropped(&self) -> usize {
        self.dropped_short + self.dropped_non_numeric + self.dropped_unreadable
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    Unchanged,
}

/// Read every data record from `reader`, skipping the header.
pub fn read_rows<R: Read>(reader: R, report: &mut ConversionReport) -> Vec<CsvRow> {
    let mut csv_reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for (position, result) in csv_reader.records().enumerate() {
        if position == 0 {
            continue;
        }
        report.records_read += 1;
        let record = match result {
            Ok(record) => record,
            Err(err) => {
                debug!(record = position, "Skipping unreadable record: {err}");
                report.dropped_unreadable += 1;
                continue;
            }
        };
        match parse_record(&record) {
            Ok(row) => {
                report.rows_kept += 1;
                rows.push(row);
            }
            Err(RowRejection::Short) => {
                debug!(record = position, columns = record.len(), "Skipping short record");
                report.dropped_short += 1;
            }
            Err(RowRejection::NonNumeric) => {
                debug!(record = position, "Skipping record with non-numeric fields");
                report.dropped_non_numeric += 1;
            }
        }
    }
    rows
}

pub fn parse_record(record: &StringRecord) -> Result<CsvRow, RowRejection> {
    if record.len() < COLUMN_COUNT {
        return Err(RowRejection::Short);
    }
    let field = |idx: usize| record.get(idx).unwrap_or_default();

    let number = |idx: usize| parse_number(field(idx)).ok_or(RowRejection::NonNumeric);
    let index = number(0)?;
    let act = number(4)?;
    let scene = number(5)?;
    let sentence = number(6)?;
    let sex = field(8);

    Ok(CsvRow {
        index,
        play_name: field(1).to_string(),
        genre: field(2).to_string(),
        character: field(3).to_string(),
        act,
        scene,
        sentence,
        text: field(7).to_string(),
        sex: (!sex.is_empty()).then(|| sex.to_string()),
    })
}

/// Read a numeric field: surrounding whitespace is ignored, empty is zero,
/// unsigned `0x`/`0o`/`0b` literals are accepted and anything that does not
/// come out finite is rejected.
pub fn parse_number(raw: &str) -> Option<Ordinal> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ordinal::new(0.0);
    }
    for (prefix, radix) in RADIX_PREFIXES {
        if let Some(digits) = raw.strip_prefix(prefix) {
            if digits.starts_with(['+', '-']) {
                return None;
            }
            let value = u128::from_str_radix(digits, radix).ok()?;
            return Ordinal::new(value as f64);
        }
    }
    Ordinal::new(raw.parse::<f64>().ok()?)
}

#[derive(Debug, Default)]
struct PlayBuilder {
    name: String,
    genre: String,
    acts: BTreeMap<Ordinal, BTreeMap<Ordinal, Vec<Line>>>,
    characters: HashMap<String, Option<String>>,
}

impl PlayBuilder {
    fn push(&mut self, row: CsvRow) {
        match self.characters.get_mut(&row.character) {
            None => {
                self.characters.insert(row.character.clone(), row.sex.clone());
            }
            Some(known) => {
                if known.is_none() && row.sex.is_some() {
                    *known = row.sex.clone();
                }
            }
        }

        self.acts
            .entry(row.act)
            .or_default()
            .entry(row.scene)
            .or_default()
            .push(Line {
                global_index: row.index,
                sentence: row.sentence,
                character: row.character,
                sex: row.sex,
                text: row.text,
            });
    }

    fn finish(self, id: String) -> Play {
        let acts = self
            .acts
            .into_iter()
            .map(|(number, scenes)| Act {
                number,
                scenes: scenes
                    .into_iter()
                    .map(|(number, mut lines)| {
                        lines.sort_by_key(|line| line.sentence);
                        Scene { number, lines }
                    })
                    .collect(),
            })
            .collect();

        let mut characters: Vec<CharacterSummary> = self
            .characters
            .into_iter()
            .map(|(name, sex)| CharacterSummary { name, sex })
            .collect();
        characters.sort_by(|a, b| collate(&a.name, &b.name));

        Play {
            id,
            name: self.name,
            genre: self.genre,
            characters,
            acts,
        }
    }
}

/// Group validated rows into the sorted play hierarchy.
pub fn build_corpus(rows: Vec<CsvRow>, report: &mut ConversionReport) -> Corpus {
    let mut slug_by_name: HashMap<String, String> = HashMap::new();
    let mut builders: HashMap<String, PlayBuilder> = HashMap::new();

    for row in rows {
        let slug = match slug_by_name.get(&row.play_name) {
            Some(slug) => slug.clone(),
            None => {
                let slug = unique_slug(&row.play_name, &builders);
                if slug != slugify(&row.play_name) {
                    warn!(
                        name = %row.play_name,
                        slug = %slug,
                        "Play name collides with an existing slug; disambiguating"
                    );
                    report.slug_collisions += 1;
                }
                slug_by_name.insert(row.play_name.clone(), slug.clone());
                builders.insert(
                    slug.clone(),
                    PlayBuilder {
                        name: row.play_name.clone(),
                        genre: row.genre.clone(),
                        ..PlayBuilder::default()
                    },
                );
                slug
            }
        };
        if let Some(builder) = builders.get_mut(&slug) {
            builder.push(row);
        }
    }

    let mut plays: Vec<Play> = builders
        .into_iter()
        .map(|(slug, builder)| builder.finish(slug))
        .collect();
    plays.sort_by(|a, b| collate(&a.name, &b.name).then_with(|| a.id.cmp(&b.id)));

    report.plays = plays.len();
    report.lines = plays.iter().map(Play::line_count).sum();
    Corpus { plays }
}

fn unique_slug(name: &str, taken: &HashMap<String, PlayBuilder>) -> String {
    let base = slugify(name);
    if !taken.contains_key(&base) {
        return base;
    }
    (2..)
        .map(|suffix| format!("{base}_{suffix}"))
        .find(|candidate| !taken.contains_key(candidate))
        .unwrap_or(base)
}

/// Pretty JSON with two-space indentation; stable for identical input.
pub fn render_corpus(corpus: &Corpus) -> Result<String> {
    serde_json::to_string_pretty(corpus).context("failed to serialize corpus")
}

pub fn write_output(payload: &str, destination: &Path) -> Result<WriteOutcome> {
    if let Ok(existing) = fs::read(destination) {
        if existing == payload.as_bytes() {
            return Ok(WriteOutcome::Unchanged);
        }
    }
    if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(destination, payload)
        .with_context(|| format!("failed to write {}", destination.display()))?;
    Ok(WriteOutcome::Written)
}

/// Run the full conversion from `csv_path` into every destination.
pub fn convert(csv_path: &Path, destinations: &[PathBuf]) -> Result<ConversionReport> {
    if !csv_path.is_file() {
        return Err(anyhow!("CSV not found at {}", csv_path.display()));
    }
    let file = fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;

    let mut report = ConversionReport::default();
    let rows = read_rows(file, &mut report);
    let corpus = build_corpus(rows, &mut report);
    let payload = render_corpus(&corpus)?;

    for destination in destinations {
        match write_output(&payload, destination)? {
            WriteOutcome::Written => info!(path = %destination.display(), "Wrote"),
            WriteOutcome::Unchanged => {
                info!(path = %destination.display(), "Output already up to date")
            }
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    const HEADER: &str = ",play_name,genre,character,act,scene,sentence,text,sex\n";

    fn unique_temp_dir(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after epoch")
            .as_nanos();
        std::env::temp_dir().join(format!("folio_test_{name}_{nanos}"))
    }

    fn n(value: u32) -> Ordinal {
        Ordinal::from(value)
    }

    fn corpus_from(csv_body: &str) -> (Corpus, ConversionReport) {
        let source = format!("{HEADER}{csv_body}");
        let mut report = ConversionReport::default();
        let rows = read_rows(source.as_bytes(), &mut report);
        let corpus = build_corpus(rows, &mut report);
        (corpus, report)
    }

    #[test]
    fn rows_are_grouped_and_sorted_at_every_level() {
        let (corpus, report) = corpus_from(
            "5,Macbeth,Tragedy,MACBETH,2,1,2,Is this a dagger,male\n\
             4,Macbeth,Tragedy,MACBETH,2,1,1,Go bid thy mistress,male\n\
             0,Macbeth,Tragedy,First Witch,1,1,1,When shall we three meet again,female\n\
             3,Macbeth,Tragedy,DUNCAN,1,2,1,What bloody man is that?,male\n\
             9,Hamlet,Tragedy,BERNARDO,1,1,1,Who's there?,male\n",
        );

        assert_eq!(report.rows_kept, 5);
        assert_eq!(report.plays, 2);
        assert_eq!(report.lines, 5);
        let names: Vec<&str> = corpus.plays.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Hamlet", "Macbeth"]);

        let macbeth = corpus.play("macbeth").expect("macbeth present");
        let acts: Vec<Ordinal> = macbeth.acts.iter().map(|a| a.number).collect();
        assert_eq!(acts, vec![n(1), n(2)]);
        let act_one_scenes: Vec<Ordinal> =
            macbeth.acts[0].scenes.iter().map(|s| s.number).collect();
        assert_eq!(act_one_scenes, vec![n(1), n(2)]);
        let sentences: Vec<Ordinal> = macbeth.acts[1].scenes[0]
            .lines
            .iter()
            .map(|l| l.sentence)
            .collect();
        assert_eq!(sentences, vec![n(1), n(2)]);

        let roster: Vec<&str> = macbeth.characters.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(roster, vec!["DUNCAN", "First Witch", "MACBETH"]);
    }

    #[test]
    fn short_and_non_finite_rows_contribute_nothing() {
        let (corpus, report) = corpus_from(
            "0,Hamlet,Tragedy,BERNARDO,1,1,1,Who's there?,male\n\
             1,Hamlet,Tragedy,FRANCISCO,1,1\n\
             x,Hamlet,Tragedy,FRANCISCO,1,1,2,Nay answer me,male\n\
             2,Hamlet,Tragedy,FRANCISCO,1,inf,2,Nay answer me,male\n\
             3,Hamlet,Tragedy,FRANCISCO,1,1,NaN,Nay answer me,male\n\
             4,Hamlet,Tragedy,FRANCISCO,1,1,2 3,Nay answer me,male\n",
        );

        assert_eq!(report.records_read, 6);
        assert_eq!(report.rows_kept, 1);
        assert_eq!(report.dropped_short, 1);
        assert_eq!(report.dropped_non_numeric, 4);
        assert_eq!(report.dropped(), 5);
        let hamlet = corpus.play("hamlet").expect("hamlet present");
        assert_eq!(hamlet.line_count(), 1);
        assert_eq!(hamlet.characters.len(), 1);
    }

    #[test]
    fn fractional_negative_and_empty_numbers_are_kept() {
        let mut report = ConversionReport::default();
        let source = format!(
            "{HEADER}0,Hamlet,Tragedy,BERNARDO,1.5,1,1,Who's there?,male\n\
             1,Hamlet,Tragedy,FRANCISCO,1,1,-3,Nay answer me,male\n\
             2,Hamlet,Tragedy,FRANCISCO,1,1,,Stand and unfold yourself,male\n\
             3,Hamlet,Tragedy,BERNARDO,1,1,2,Long live the king!,male\n"
        );

        let rows = read_rows(source.as_bytes(), &mut report);

        assert_eq!(report.rows_kept, 4);
        assert_eq!(report.dropped(), 0);
        assert_eq!(rows[0].act, Ordinal::new(1.5).expect("finite"));
        assert_eq!(rows[1].sentence, Ordinal::new(-3.0).expect("finite"));
        assert_eq!(rows[2].sentence, n(0));

        let corpus = build_corpus(rows, &mut report);
        let hamlet = corpus.play("hamlet").expect("hamlet present");
        let acts: Vec<String> = hamlet.acts.iter().map(|a| a.number.to_string()).collect();
        assert_eq!(acts, vec!["1", "1.5"]);
        let sentences: Vec<String> = hamlet.acts[0].scenes[0]
            .lines
            .iter()
            .map(|l| l.sentence.to_string())
            .collect();
        assert_eq!(sentences, vec!["-3", "0", "2"]);

        let json = render_corpus(&corpus).expect("render");
        assert!(json.contains("\"number\": 1.5"));
        assert!(json.contains("\"sentence\": -3"));
        assert!(json.contains("\"globalIndex\": 2,"));
    }

    #[test]
    fn numeric_fields_accept_padding_and_radix_literals() {
        assert_eq!(parse_number("  7 "), Some(n(7)));
        assert_eq!(parse_number(""), Some(n(0)));
        assert_eq!(parse_number("0x1A"), Some(n(26)));
        assert_eq!(parse_number("0b101"), Some(n(5)));
        assert_eq!(parse_number("1e3"), Some(n(1000)));
        assert_eq!(parse_number("0x-1"), None);
        assert_eq!(parse_number("-inf"), None);
        assert_eq!(parse_number("twelve"), None);
    }

    #[test]
    fn undecodable_record_is_skipped_and_reading_continues() {
        let mut source = HEADER.as_bytes().to_vec();
        source.extend_from_slice(b"0,Hamlet,Tragedy,BERNARDO,1,1,1,Who's there?,male\n");
        source.extend_from_slice(b"1,Hamlet,Tragedy,FRANCISCO,1,1,2,Nay \xff\xfe answer me,male\n");
        source.extend_from_slice(b"2,Hamlet,Tragedy,FRANCISCO,1,1,3,Stand and unfold yourself,male\n");
        let mut report = ConversionReport::default();

        let rows = read_rows(source.as_slice(), &mut report);

        assert_eq!(report.records_read, 3);
        assert_eq!(report.dropped_unreadable, 1);
        assert_eq!(report.rows_kept, 2);
        let texts: Vec<&str> = rows.iter().map(|row| row.text.as_str()).collect();
        assert_eq!(texts, vec!["Who's there?", "Stand and unfold yourself"]);
    }

    #[test]
    fn known_sex_backfills_regardless_of_order() {
        let (corpus, _) = corpus_from(
            "0,Twelfth Night,Comedy,VIOLA,1,2,1,What country friends is this?,\n\
             1,Twelfth Night,Comedy,VIOLA,1,2,2,And what should I do in Illyria?,female\n\
             2,Twelfth Night,Comedy,ORSINO,1,1,1,If music be the food of love,male\n\
             3,Twelfth Night,Comedy,ORSINO,1,1,2,play on,\n",
        );

        let play = corpus.play("twelfth_night").expect("play present");
        let viola = play.characters.iter().find(|c| c.name == "VIOLA").unwrap();
        let orsino = play.characters.iter().find(|c| c.name == "ORSINO").unwrap();
        assert_eq!(viola.sex.as_deref(), Some("female"));
        assert_eq!(orsino.sex.as_deref(), Some("male"));
        let first_line = &play.acts[0].scenes[1].lines[0];
        assert_eq!(first_line.sex, None);
    }

    #[test]
    fn quoted_fields_keep_commas_and_quotes() {
        let (corpus, _) = corpus_from(
            "0,\"A Midsummer Night's Dream\",Comedy,PUCK,5,1,1,\"If we shadows have offended, think but this\",\n\
             1,\"A Midsummer Night's Dream\",Comedy,PUCK,5,1,2,\"And \"\"all\"\" is mended\",\n",
        );

        let play = corpus
            .play("a_midsummer_night_s_dream")
            .expect("slugged play present");
        let lines = &play.acts[0].scenes[0].lines;
        assert_eq!(lines[0].text, "If we shadows have offended, think but this");
        assert_eq!(lines[1].text, "And \"all\" is mended");
    }

    #[test]
    fn colliding_slugs_are_suffixed_instead_of_merged() {
        let (corpus, report) = corpus_from(
            "0,Henry V,History,CHORUS,1,0,1,O for a Muse of fire,\n\
             1,Henry-V,History,KING,1,1,1,Once more unto the breach,male\n\
             2,Henry V,History,CHORUS,1,0,2,that would ascend,\n",
        );

        assert_eq!(report.slug_collisions, 1);
        let ids: Vec<&str> = corpus.plays.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["henry_v", "henry_v_2"]);
        assert_eq!(corpus.play("henry_v").map(Play::line_count), Some(2));
        assert_eq!(corpus.play("henry_v_2").map(|p| p.name.as_str()), Some("Henry-V"));
    }

    #[test]
    fn duplicate_sentence_numbers_keep_source_order() {
        let (corpus, _) = corpus_from(
            "10,Hamlet,Tragedy,HAMLET,3,1,4,second,male\n\
             11,Hamlet,Tragedy,HAMLET,3,1,4,third,male\n\
             9,Hamlet,Tragedy,HAMLET,3,1,1,first,male\n",
        );

        let texts: Vec<&str> = corpus.plays[0].acts[0].scenes[0]
            .lines
            .iter()
            .map(|l| l.text.as_str())
            .collect();
        assert_eq!(texts, vec!["first", "second", "third"]);
    }

    #[test]
    fn conversion_is_byte_identical_across_runs() {
        let dir = unique_temp_dir("convert_idempotent");
        fs::create_dir_all(&dir).expect("create temp dir");
        let csv_path = dir.join("plays.csv");
        fs::write(
            &csv_path,
            format!(
                "{HEADER}1,Macbeth,Tragedy,MACBETH,1,3,1,So foul and fair a day,male\n\
                 0,Hamlet,Tragedy,BERNARDO,1,1,1,Who's there?,male\n"
            ),
        )
        .expect("write csv");
        let first = dir.join("data/plays.json");
        let second = dir.join("public/data/plays.json");

        let report = convert(&csv_path, &[first.clone(), second.clone()]).expect("convert");
        assert_eq!(report.plays, 2);
        let run_one = fs::read(&first).expect("read output");
        assert_eq!(run_one, fs::read(&second).expect("read mirror"));

        assert_eq!(
            write_output(std::str::from_utf8(&run_one).unwrap(), &first).expect("rewrite"),
            WriteOutcome::Unchanged
        );
        convert(&csv_path, &[first.clone()]).expect("convert again");
        assert_eq!(run_one, fs::read(&first).expect("reread output"));

        let decoded: Corpus = serde_json::from_slice(&run_one).expect("valid json");
        assert_eq!(decoded.plays[0].id, "hamlet");
        let _ = fs::remove_dir_all(dir);
    }

    #[test]
    fn missing_source_is_fatal_and_writes_nothing() {
        let dir = unique_temp_dir("convert_missing");
        let output = dir.join("data/plays.json");

        let err = convert(&dir.join("absent.csv"), &[output.clone()]).unwrap_err();

        assert!(err.to_string().contains("CSV not found"));
        assert!(!output.exists());
    }
}
