use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use pepxml_convert::dataset::{ConversionConfig, DatasetConverter};
use pepxml_convert::mass::MassType;
use pepxml_convert::modifications::{CatalogBuilder, MapperOptions, ModificationMapper};
use pepxml_convert::results::AnnotatedPeptide;
use std::fmt::Write as _;
use std::fs;
use std::hint::black_box;
use tempfile::TempDir;

const PEPTIDES: [&str; 4] = [
    "K.AVAAGM[+15.9949]NPM[+15.9949]DLK.R",
    "R.n[+42.0106]SAMPLEK.L",
    "K.LC[+57.0215]VEK.S",
    "-.MKAVAAGMNPMDLK.R",
];

/// Generate a synthetic MS-GF+ hit table
fn generate_hit_table(path: &std::path::Path, num_hits: usize) {
    let mut content = String::from("ResultID\tScan\tCharge\tMH\tPeptide\tProtein\tRank\tDelM\tMSGFScore\tSpecEValue\n");
    for i in 0..num_hits {
        let scan = 1000 + i / 3;
        let rank = i % 3 + 1;
        writeln!(
            content,
            "{}\t{}\t2\t1249.5612\t{}\tSO_{:04}\t{}\t0.002\t{}\t1e-{}",
            i + 1,
            scan,
            PEPTIDES[i % PEPTIDES.len()],
            i % 500,
            rank,
            150 - rank * 10,
            12 - rank
        )
        .expect("write to string");
    }
    fs::write(path, content).expect("Failed to write test hit table");
}

/// Benchmark hit table to pepXML conversion
fn bench_conversion(c: &mut Criterion) {
    let mut group = c.benchmark_group("pepxml_conversion");

    for num_hits in [1_000, 10_000, 50_000] {
        group.throughput(Throughput::Elements(num_hits as u64));
        group.bench_with_input(BenchmarkId::from_parameter(format!("{}hits", num_hits)), &num_hits, |b, &num_hits| {
            b.iter_batched(
                || {
                    let temp_dir = TempDir::new().unwrap();
                    let table = temp_dir.path().join("bench_msgfplus_syn.txt");
                    generate_hit_table(&table, num_hits);
                    (temp_dir, table)
                },
                |(temp_dir, table)| {
                    let converter = DatasetConverter::new(ConversionConfig::minimal());
                    let report = converter.convert(&table, None);
                    assert!(report.is_success());
                    drop(temp_dir);
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

/// Benchmark annotated peptide parsing
fn bench_peptide_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("peptide_parsing");
    group.throughput(Throughput::Elements(PEPTIDES.len() as u64));

    group.bench_function("annotated", |b| {
        b.iter(|| {
            for text in PEPTIDES {
                black_box(AnnotatedPeptide::parse(black_box(text)).unwrap());
            }
        });
    });

    group.finish();
}

/// Benchmark modification mapping against an inferred catalog
fn bench_mapping(c: &mut Criterion) {
    let peptides: Vec<AnnotatedPeptide> = PEPTIDES.iter().map(|t| AnnotatedPeptide::parse(t).unwrap()).collect();

    let mut builder = CatalogBuilder::new(MassType::Monoisotopic, 0.0005);
    for peptide in &peptides {
        builder.observe_peptide(peptide, &peptide.evidence).unwrap();
    }
    let catalog = builder.build().unwrap();
    let mapper = ModificationMapper::new(&catalog, MapperOptions::default());

    let mut group = c.benchmark_group("modification_mapping");
    group.throughput(Throughput::Elements(peptides.len() as u64));

    group.bench_function("inferred_catalog", |b| {
        b.iter(|| {
            for peptide in &peptides {
                black_box(mapper.map(peptide, &peptide.evidence).unwrap());
            }
        });
    });

    group.finish();
}

criterion_group!(benches, bench_conversion, bench_peptide_parsing, bench_mapping);
criterion_main!(benches);
