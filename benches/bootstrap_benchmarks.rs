use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mindset_ate::causal::{EstimationContext, Method};
use mindset_ate::config::ReplicatePolicy;
use mindset_ate::encoding::FeatureEncoder;
use mindset_ate::propensity::PropensityModel;
use mindset_ate::simulate::SyntheticStudy;
use mindset_ate::{Bootstrap, ColumnSpec, StudyConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

pub fn estimator_benchmarks(c: &mut Criterion) {
    let data = SyntheticStudy::new(10_000, 0.4, 0)
        .generate()
        .expect("Something went wrong generating the data");
    let config = StudyConfig::default();
    let encoder = FeatureEncoder::fit(&ColumnSpec::mindset(), &data).expect("Something went wrong encoding the data");
    let design = encoder.transform(&data).expect("Something went wrong encoding the data");
    let ctx = EstimationContext::new(encoder, &config);

    c.bench_function("propensity fit", |b| {
        b.iter(|| {
            PropensityModel::new(config.solver)
                .fit(black_box(&design.matrix()), black_box(&data.treatment))
                .unwrap()
        })
    });
    for method in Method::ALL {
        c.bench_function(&format!("estimate {:?}", method), |b| {
            b.iter(|| {
                let mut rng = StdRng::seed_from_u64(0);
                method
                    .estimate(&ctx, black_box(&data), &mut rng, ReplicatePolicy::DiscardReplicate)
                    .unwrap()
            })
        });
    }

    let mut bootstrap = c.benchmark_group("bootstrap");
    bootstrap.warm_up_time(Duration::from_secs(5));
    bootstrap.sample_size(10);
    for threads in [1, 4] {
        let engine = Bootstrap {
            num_threads: Some(threads),
            ..Bootstrap::new(100, 0)
        };
        bootstrap.bench_function(format!("aipw B=100 threads={}", threads), |b| {
            b.iter(|| {
                engine
                    .run(black_box(&data), |sample, rng| {
                        Method::Aipw.estimate(&ctx, sample, rng, ReplicatePolicy::DiscardReplicate)
                    })
                    .unwrap()
            })
        });
    }
    bootstrap.finish();
}

criterion_group!(benches, estimator_benchmarks);
criterion_main!(benches);
