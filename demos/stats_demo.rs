use core::hash::Hasher;

use clap::Parser;
use clap::ValueEnum;
use hmap::BytewiseEq;
use hmap::FoldHash;
use hmap::HashTable;
use hmap::KeyHasher;
use hmap::WordHash;
use siphasher::sip::SipHasher;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Strategy {
    /// First eight key bytes as an integer.
    Word,
    /// foldhash over every key byte.
    Fold,
    /// SipHash-2-4 over every key byte.
    Sip,
}

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'c', long = "capacity", default_value_t = 1024)]
    capacity: usize,

    #[arg(short = 'n', long = "entries", default_value_t = 500)]
    entries: u64,

    #[arg(short = 'k', long = "key_size", default_value_t = 8)]
    key_size: usize,

    /// Multiplier applied to each entry number to form its key.
    #[arg(short = 's', long = "stride", default_value_t = 1)]
    stride: u64,

    /// Erase every n-th key after filling, leaving tombstones.
    #[arg(short = 'e', long = "erase_every")]
    erase_every: Option<u64>,

    #[arg(long, value_enum, default_value_t = Strategy::Word)]
    strategy: Strategy,
}

fn sip(key: &[u8]) -> u64 {
    let mut hasher = SipHasher::new();
    hasher.write(key);
    hasher.finish()
}

fn key_bytes(n: u64, key_size: usize) -> Vec<u8> {
    let mut key = vec![0u8; key_size];
    let bytes = n.to_ne_bytes();
    let len = key_size.min(bytes.len());
    key[..len].copy_from_slice(&bytes[..len]);
    key
}

fn run<H: KeyHasher>(args: &Args, hasher: H) {
    println!(
        "Creating HashTable with capacity {} and {} byte keys",
        args.capacity, args.key_size
    );

    let mut table = match HashTable::try_with_strategy(
        args.key_size,
        8,
        args.capacity,
        hasher,
        BytewiseEq,
    ) {
        Ok(table) => table,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(2);
        }
    };

    println!("Filling table with {} keys...", args.entries);
    for n in 0..args.entries {
        let key = key_bytes(n.wrapping_mul(args.stride), args.key_size);
        table.insert(&key, &n.to_ne_bytes());
    }

    if let Some(every) = args.erase_every.filter(|&every| every > 0) {
        let mut erased = 0;
        for n in (0..args.entries).step_by(every as usize) {
            let key = key_bytes(n.wrapping_mul(args.stride), args.key_size);
            if table.erase(&key) {
                erased += 1;
            }
        }
        println!("Erased {erased} keys");
    }

    println!("Final capacity: {}", table.capacity());
    println!("{table:?}");

    let histogram = table.probe_histogram();
    println!("Probe distance histogram:");
    for (distance, count) in histogram.iter().enumerate().filter(|(_, count)| **count > 0) {
        println!("  {distance:>4}: {count}");
    }
    table.debug_stats().print();
}

fn main() {
    let args = Args::parse();

    match args.strategy {
        Strategy::Word => run(&args, WordHash),
        Strategy::Fold => run(&args, FoldHash::default()),
        Strategy::Sip => run(&args, sip as fn(&[u8]) -> u64),
    }
}
