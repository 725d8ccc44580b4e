use airquality_processor::engine::{Counters, LocalEngine};
use airquality_processor::models::{Measurement, Pollutant, PollutantSet, SourceLine, StationMetadata};
use airquality_processor::processors::{
    cross_join, MalformedLinePolicy, PivotAggregator, TimeJoinInput, TimeWindowJoiner,
};
use airquality_processor::readers::{HeaderParser, WeatherFile};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn station() -> StationMetadata {
    StationMetadata::new(
        "MzWarAlNiepo".to_string(),
        "PL0140A".to_string(),
        "52.219298".to_string(),
        "21.004724".to_string(),
        "MAZOWIECKIE".to_string(),
        "Warszawa".to_string(),
    )
}

// One header row with `stations` columns per pollutant
fn create_header(stations: usize) -> String {
    let mut header = String::from("Time");
    for i in 0..stations {
        for token in ["PM10-1g", "PM2.5-1g", "SO2-1g", "NO21g", "C6H6-24g", "O3-1g"] {
            header.push_str(&format!(",St{:04}-{}", i, token));
        }
    }
    header
}

fn create_group(hours: usize) -> Vec<Vec<Measurement>> {
    (0..hours)
        .map(|h| {
            Pollutant::ALL
                .iter()
                .map(|p| {
                    Measurement::new(
                        format!("2024-01-{:02}T{:02}", h / 24 + 1, h % 24),
                        "MzWarAlNiepo".to_string(),
                        *p,
                        format!("{}.{}", h, p.as_str().len()),
                    )
                })
                .collect()
        })
        .collect()
}

fn benchmark_header_parser(c: &mut Criterion) {
    let parser = HeaderParser::new(&PollutantSet::default()).unwrap();
    let header = create_header(200);

    c.bench_function("header_parser", |b| {
        b.iter(|| {
            let mut counters = Counters::new();
            let map = parser.parse_header(black_box(&header), &mut counters);
            black_box(map.len())
        })
    });
}

fn benchmark_pivot(c: &mut Criterion) {
    let aggregator = PivotAggregator::new(PollutantSet::default());
    let metadata = station();
    let groups = create_group(24 * 31);

    c.bench_function("pivot_month", |b| {
        b.iter(|| {
            let mut counters = Counters::new();
            let mut emitted = 0;
            for group in &groups {
                let timestamp = group[0].timestamp.clone();
                if aggregator
                    .pivot("MzWarAlNiepo", &timestamp, &metadata, group.clone(), &mut counters)
                    .is_some()
                {
                    emitted += 1;
                }
            }
            black_box(emitted)
        })
    });
}

fn benchmark_bucket_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("cross_join_by_bucket_size");

    for &size in &[1, 4, 16, 60] {
        group.bench_with_input(BenchmarkId::new("rows_per_side", size), &size, |b, &n| {
            let values: Vec<SourceLine> = (0..n)
                .flat_map(|i| {
                    [
                        SourceLine::Pollution(format!("2024-01-01T00:{:02},MzWarAlNiepo,{}", i, i)),
                        SourceLine::Weather(format!("2024-01-01T00:{:02},-1.{}", i, i)),
                    ]
                })
                .collect();
            b.iter(|| black_box(cross_join(values.clone()).len()))
        });
    }

    group.finish();
}

fn benchmark_weather_join(c: &mut Criterion) {
    let pollution: Vec<String> = (0..24 * 31)
        .map(|h| format!("2024-01-{:02}T{:02},MzWarAlNiepo,PL0140A,52.2,21.0,{}", h / 24 + 1, h % 24, h))
        .collect();
    let weather: Vec<String> = (0..24 * 31)
        .map(|h| format!("2024-01-{:02}T{:02}:00,-1.{},85", h / 24 + 1, h % 24, h % 10))
        .collect();
    let inputs = vec![
        TimeJoinInput::Pollution {
            source: "pollution.csv".to_string(),
            lines: pollution,
        },
        TimeJoinInput::Weather(WeatherFile {
            source: "openmeteo_MzWarAlNiepo_2024.csv".to_string(),
            station_id: Some("MzWarAlNiepo".to_string()),
            lines: weather,
        }),
    ];
    let engine = LocalEngine::new(4);
    let joiner = TimeWindowJoiner::new(MalformedLinePolicy::Skip).unwrap();

    c.bench_function("weather_join_month", |b| {
        b.iter(|| black_box(joiner.run(&engine, &inputs).map(|o| o.records.len()).unwrap_or(0)))
    });
}

criterion_group!(
    benches,
    benchmark_header_parser,
    benchmark_pivot,
    benchmark_bucket_sizes,
    benchmark_weather_join
);
criterion_main!(benches);
