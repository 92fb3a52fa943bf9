//! Thin demonstration driver for the `gem3-mapper` library:
//! a single `map` subcommand that loads a small FASTA reference into an
//! [`InMemoryArchive`], reads FASTQ(-like) records from one or two files,
//! and prints each read's best match.

use std::env;
use std::process;

use clap::{Arg, ArgAction, Command};
use log::LevelFilter;
use rayon::prelude::*;

use gem3_mapper::archive::InMemoryArchive;
use gem3_mapper::config::SearchConfiguration;
use gem3_mapper::paired::PairedEndCoordinator;
use gem3_mapper::search::{map_read, CancelToken, SearchStatus};

fn build_cli() -> Command {
    Command::new("gem3")
        .version(clap::crate_version!())
        .about("Adaptive approximate short-read mapper over an FM-indexed reference archive")
        .subcommand(
            Command::new("map")
                .about("Map FASTQ reads against a FASTA reference")
                .arg(
                    Arg::new("reference")
                        .long("reference")
                        .short('r')
                        .required(true)
                        .help("Path to the FASTA reference"),
                )
                .arg(
                    Arg::new("reads1")
                        .long("reads")
                        .short('1')
                        .required(true)
                        .help("Path to the FASTQ read file (mate 1 in paired mode)"),
                )
                .arg(
                    Arg::new("reads2")
                        .long("mate2")
                        .short('2')
                        .help("Path to the FASTQ mate-2 file; enables paired-end mode"),
                )
                .arg(
                    Arg::new("max-error")
                        .long("max-error")
                        .value_parser(clap::value_parser!(u32))
                        .help("Absolute edit-distance budget per read (default 4)"),
                )
                .arg(
                    Arg::new("threads")
                        .long("threads")
                        .short('t')
                        .value_parser(clap::value_parser!(usize))
                        .help("Worker thread count (default 1)"),
                )
                .arg(
                    Arg::new("gpu-enabled")
                        .long("gpu-enabled")
                        .action(ArgAction::SetTrue)
                        .help("Prefer the GPU backend when available (no-op: only NullGpuBackend ships)"),
                )
                .arg(
                    Arg::new("verbose")
                        .long("verbose")
                        .short('v')
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("quiet")
                        .long("quiet")
                        .short('q')
                        .action(ArgAction::SetTrue),
                ),
        )
}

fn set_log_level(matches: &clap::ArgMatches) {
    let mut log_level = LevelFilter::Info;
    if matches.get_flag("verbose") {
        log_level = LevelFilter::Debug;
    }
    if matches.get_flag("quiet") {
        log_level = LevelFilter::Error;
    }
    let mut builder = env_logger::Builder::new();
    builder.filter_level(log_level);
    if let Ok(filters) = env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    let _ = builder.try_init();
}

fn load_reference(path: &str) -> InMemoryArchive {
    let reader = bio::io::fasta::Reader::from_file(path).unwrap_or_else(|e| {
        log::error!("failed to open reference {}: {}", path, e);
        process::exit(1);
    });
    let mut chromosomes: Vec<(String, Vec<u8>)> = Vec::new();
    for record in reader.records() {
        let record = record.unwrap_or_else(|e| {
            log::error!("malformed FASTA record in {}: {}", path, e);
            process::exit(1);
        });
        chromosomes.push((record.id().to_string(), record.seq().to_vec()));
    }
    let borrowed: Vec<(&str, &[u8])> = chromosomes
        .iter()
        .map(|(name, seq)| (name.as_str(), seq.as_slice()))
        .collect();
    InMemoryArchive::from_chromosomes(&borrowed)
}

struct FastqRecord {
    id: String,
    sequence: Vec<u8>,
    qualities: Vec<u8>,
}

fn load_fastq(path: &str) -> Vec<FastqRecord> {
    let reader = bio::io::fastq::Reader::from_file(path).unwrap_or_else(|e| {
        log::error!("failed to open reads {}: {}", path, e);
        process::exit(1);
    });
    reader
        .records()
        .map(|r| {
            let record = r.unwrap_or_else(|e| {
                log::error!("malformed FASTQ record in {}: {}", path, e);
                process::exit(1);
            });
            FastqRecord {
                id: record.id().to_string(),
                sequence: record.seq().to_vec(),
                qualities: record.qual().to_vec(),
            }
        })
        .collect()
}

fn run_single_end(archive: &InMemoryArchive, reads: &[FastqRecord], config: &SearchConfiguration) {
    let lines: Vec<String> = reads
        .par_iter()
        .map(|read| match map_read(archive, &read.sequence, &read.qualities, config, &CancelToken::new()) {
            Ok((matches, SearchStatus::Mapped)) => {
                let best = matches.best_match().expect("mapped status implies a best match");
                format!(
                    "{}\t{}\t{}\t{}\t{}",
                    read.id, best.sequence_name, best.text_position, best.edit_distance, best.cigar
                )
            }
            Ok((_, status)) => format!("{}\t*\t0\t*\t{:?}", read.id, status),
            Err(e) => {
                log::error!("archive error mapping read {}: {}", read.id, e);
                process::exit(1);
            }
        })
        .collect();
    for line in lines {
        println!("{}", line);
    }
}

fn run_paired_end(
    archive: &InMemoryArchive,
    reads1: &[FastqRecord],
    reads2: &[FastqRecord],
    config: &SearchConfiguration,
) {
    let coordinator = PairedEndCoordinator::new(archive, config);
    let pairs = reads1.iter().zip(reads2.iter());
    let lines: Vec<String> = pairs
        .collect::<Vec<_>>()
        .into_par_iter()
        .map(|(m1, m2)| {
            let result = coordinator
                .search(
                    &m1.sequence,
                    &m1.qualities,
                    &m2.sequence,
                    &m2.qualities,
                    &CancelToken::new(),
                )
                .unwrap_or_else(|e| {
                    log::error!("archive error mapping pair {}/{}: {}", m1.id, m2.id, e);
                    process::exit(1);
                });
            match result.best() {
                Some((template, mapq)) => format!(
                    "{}\t{}\t{}\t{}\t{}\t{}\tmapq={}",
                    m1.id,
                    m2.id,
                    template.end1.sequence_name,
                    template.end1.text_position,
                    template.end2.text_position,
                    template.observed_insert,
                    mapq
                ),
                None => format!("{}\t{}\tunpaired", m1.id, m2.id),
            }
        })
        .collect();
    for line in lines {
        println!("{}", line);
    }
}

fn main() {
    let app = build_cli();
    let matches = app.get_matches();

    match matches.subcommand() {
        Some(("map", m)) => {
            set_log_level(m);
            let threads = m.get_one::<usize>("threads").copied().unwrap_or(1);
            rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build_global()
                .unwrap_or_else(|e| log::warn!("could not size the rayon pool: {}", e));

            let mut config = SearchConfiguration {
                threads,
                gpu_enabled: m.get_flag("gpu-enabled"),
                ..SearchConfiguration::default()
            };
            if let Some(max_error) = m.get_one::<u32>("max-error").copied() {
                config.max_error = gem3_mapper::config::ErrorBudget::Absolute(max_error);
            }

            let archive = load_reference(m.get_one::<String>("reference").unwrap());
            let reads1 = load_fastq(m.get_one::<String>("reads1").unwrap());

            match m.get_one::<String>("reads2") {
                Some(path2) => {
                    let reads2 = load_fastq(path2);
                    run_paired_end(&archive, &reads1, &reads2, &config);
                }
                None => run_single_end(&archive, &reads1, &config),
            }
        }
        _ => {
            build_cli().print_help().unwrap();
            println!();
        }
    }
}
