use std::sync::Arc;
use nalgebra::DVector;
use rand::SeedableRng;
use rand::rngs::StdRng;
use proptest::prelude::*;
use tracing_subscriber::EnvFilter;
use belief::prob::*;
use belief::fit::{Fit, FitParams};
use belief::model::{parse_distribution, NetworkSpec, TextFormat};
use belief::dispatch::*;
use belief::inference::{Engine, PropagationError};
use belief::graph::BeliefNetwork;
use belief::graph::remote::{RemoteVariable, TransportError};
use belief::config::{Config, EdgeFailurePolicy};

const EPS : f64 = 10E-8;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn scalar(x : f64) -> DVector<f64> {
    DVector::from_element(1, x)
}

fn gaussian(m : f64, s : f64) -> Box<dyn ConditionalDistribution> {
    Box::new(Gaussian::new(m, s).unwrap())
}

fn linear(a : f64, b : f64, v : f64) -> Box<dyn ConditionalDistribution> {
    Box::new(ConditionalGaussian::single(a, b, v).unwrap())
}

#[test]
fn chain_marginal() {
    init_tracing();
    let mut bn = BeliefNetwork::new("chain");
    bn.add_variable("x", gaussian(0.0, 1.0), &[]).unwrap();
    bn.add_variable("y", linear(2.0, 1.0, 1.0), &["x"]).unwrap();
    bn.add_variable("z", linear(-1.0, 0.0, 0.5), &["y"]).unwrap();
    let z = bn.posterior("z").unwrap();
    assert_eq!(z.kind(), Kind::Gaussian);
    assert!((z.expected_value().unwrap() + 1.0).abs() < EPS);
    assert!((z.sqrt_variance().unwrap() - 5.5f64.sqrt()).abs() < EPS);
}

#[test]
fn kalman_posterior_at_root() {
    init_tracing();
    let mut bn = BeliefNetwork::new("kalman");
    bn.add_variable("x0", gaussian(0.0, 1.0), &[]).unwrap();
    bn.add_variable("x1", linear(1.0, 0.0, 1.0), &["x0"]).unwrap();
    bn.add_variable("z", linear(1.0, 0.0, 1.0), &["x1"]).unwrap();
    for z in [-2.0, 0.5, 3.0].iter() {
        bn.assign_evidence("z", *z).unwrap();
        let x0 = bn.posterior("x0").unwrap();
        assert!((x0.expected_value().unwrap() - z / 3.0).abs() < EPS);
        assert!((x0.sqrt_variance().unwrap() - (2.0f64 / 3.0).sqrt()).abs() < EPS);

        // Smoothed middle state: x1 | z with var(x1) = 2, cov(x1, z) = 2, var(z) = 3.
        let x1 = bn.posterior("x1").unwrap();
        assert!((x1.expected_value().unwrap() - 2.0 * z / 3.0).abs() < EPS);
        assert!((x1.sqrt_variance().unwrap() - (2.0f64 / 3.0).sqrt()).abs() < EPS);
    }
}

#[test]
fn two_component_mixture_recovery() {
    init_tracing();
    let truth = Mixture::equal(vec![
        Box::new(Gaussian::new(-5.0, 1.0).unwrap()),
        Box::new(Gaussian::new(5.0, 1.0).unwrap())
    ]).unwrap();
    let mut rng = StdRng::seed_from_u64(42);
    let data : Vec<DVector<f64>> = (0..1000).map(|_| truth.sample(&mut rng).unwrap()).collect();

    let mut m = Mixture::equal(vec![
        Box::new(Gaussian::new(-1.0, 2.0).unwrap()),
        Box::new(Gaussian::new(1.0, 2.0).unwrap())
    ]).unwrap();
    let fit = m.fit(&data, None, &FitParams { max_iterations : 50, tolerance : 1e-6 }).unwrap();
    match fit {
        Fit::Fitted { iterations, neg_log_likelihood } => {
            // Well-separated components: the tolerance stops EM before the cap.
            assert!(iterations < 50, "{} iterations", iterations);
            assert!(neg_log_likelihood.is_finite());
        },
        Fit::Unsupported => panic!("Mixture fit reported as unsupported")
    }
    let mut means : Vec<f64> = m.components().iter().map(|c| c.expected_value().unwrap()).collect();
    means.sort_by(|a, b| a.partial_cmp(b).unwrap());
    assert!((means[0] + 5.0).abs() < 0.3, "{:?}", means);
    assert!((means[1] - 5.0).abs() < 0.3, "{:?}", means);
    for p in m.proportions() {
        assert!((p - 0.5).abs() < 0.05, "{:?}", m.proportions());
    }
}

#[test]
fn discrete_bayes_rule() {
    init_tracing();
    let mut bn = BeliefNetwork::new("rain");
    bn.add_variable("rain", Box::new(Discrete::univariate(vec![0.8, 0.2]).unwrap()), &[]).unwrap();
    bn.add_variable(
        "wet",
        Box::new(ConditionalDiscrete::new(2, vec![2], vec![vec![0.9, 0.1], vec![0.2, 0.8]]).unwrap()),
        &["rain"]
    ).unwrap();
    let wet = bn.posterior("wet").unwrap();
    assert!((wet.density(&scalar(1.0)).unwrap() - (0.8 * 0.1 + 0.2 * 0.8)).abs() < EPS);
    bn.assign_evidence("wet", 1.0).unwrap();
    let rain = bn.posterior("rain").unwrap();
    assert!((rain.density(&scalar(1.0)).unwrap() - 2.0 / 3.0).abs() < EPS);
}

#[test]
fn explaining_away() {
    init_tracing();
    let table = vec![vec![0.99, 0.01], vec![0.2, 0.8], vec![0.3, 0.7], vec![0.05, 0.95]];
    let mut bn = BeliefNetwork::new("alarm");
    bn.add_variable("a", Box::new(Discrete::univariate(vec![0.9, 0.1]).unwrap()), &[]).unwrap();
    bn.add_variable("b", Box::new(Discrete::univariate(vec![0.7, 0.3]).unwrap()), &[]).unwrap();
    bn.add_variable("c", Box::new(ConditionalDiscrete::new(2, vec![2, 2], table.clone()).unwrap()), &["a", "b"]).unwrap();

    let pa = [0.9, 0.1];
    let pb = [0.7, 0.3];
    let joint = |a : usize, b : usize, c : usize| pa[a] * pb[b] * table[2 * a + b][c];

    bn.assign_evidence("c", 1.0).unwrap();
    let num : f64 = (0..2).map(|b| joint(1, b, 1)).sum();
    let den : f64 = (0..2).flat_map(|a| (0..2).map(move |b| (a, b))).map(|(a, b)| joint(a, b, 1)).sum();
    let a = bn.posterior("a").unwrap();
    assert!((a.density(&scalar(1.0)).unwrap() - num / den).abs() < EPS);

    bn.assign_evidence("b", 1.0).unwrap();
    let expected = joint(1, 1, 1) / (joint(0, 1, 1) + joint(1, 1, 1));
    let a = bn.posterior("a").unwrap();
    assert!((a.density(&scalar(1.0)).unwrap() - expected).abs() < EPS);
    assert!(expected < num / den);
}

#[test]
fn pi_message_leaves_out_recipient() {
    init_tracing();
    let mut bn = BeliefNetwork::new("fork");
    bn.add_variable("x", gaussian(0.0, 1.0), &[]).unwrap();
    bn.add_variable("y1", linear(1.0, 0.0, 1.0), &["x"]).unwrap();
    bn.add_variable("y2", linear(1.0, 0.0, 1.0), &["x"]).unwrap();
    bn.assign_evidence("y1", 2.0).unwrap();
    let msg = bn.pi_message("x", "y2").unwrap();
    assert!((msg.expected_value().unwrap() - 1.0).abs() < EPS);
    assert!((msg.sqrt_variance().unwrap() - 0.5f64.sqrt()).abs() < EPS);
    let y2 = bn.posterior("y2").unwrap();
    assert!((y2.sqrt_variance().unwrap() - 1.5f64.sqrt()).abs() < EPS);
    assert_eq!(bn.pi_message("x", "y1").unwrap().kind(), Kind::Gaussian);
    assert!(matches!(bn.pi_message("y1", "x"), Err(PropagationError::NotAParent(_, _))));
}

#[test]
fn mixture_prior_with_gaussian_observation() {
    let mut bn = BeliefNetwork::new("modes");
    let prior = Mixture::equal(vec![
        Box::new(Gaussian::new(-5.0, 1.0).unwrap()),
        Box::new(Gaussian::new(5.0, 1.0).unwrap())
    ]).unwrap();
    bn.add_variable("x", Box::new(prior), &[]).unwrap();
    bn.add_variable("y", linear(1.0, 0.0, 1.0), &["x"]).unwrap();
    assert_eq!(bn.pi("y").unwrap().kind(), Kind::Mixture);
    bn.assign_evidence("y", 4.5).unwrap();
    let x = bn.posterior("x").unwrap();
    assert_eq!(x.kind(), Kind::Mixture);
    assert!((x.expected_value().unwrap() - 4.75).abs() < 1e-6);
}

#[test]
fn text_round_trips() {
    let dists : Vec<Box<dyn Distribution>> = vec![
        Box::new(Gaussian::new(1.5, 0.25).unwrap()),
        Box::new(Discrete::univariate(vec![0.1, 0.2, 0.7]).unwrap()),
        Box::new(Uniform::new(-2.0, 3.0).unwrap()),
        Box::new(Mixture::new(vec![
            Box::new(Gaussian::new(-1.0, 1.0).unwrap()),
            Box::new(Uniform::new(0.0, 4.0).unwrap())
        ], vec![0.3, 0.7]).unwrap())
    ];
    for d in dists.iter() {
        let text = d.to_text("");
        let back = parse_distribution(&text).unwrap();
        assert_eq!(back.kind(), d.kind(), "{}", text);
        for x in [-1.0, 0.0, 1.0, 2.0].iter() {
            let (a, b) = (d.density(&scalar(*x)).unwrap(), back.density(&scalar(*x)).unwrap());
            assert!((a - b).abs() < EPS, "{} at {}: {} vs {}", text, x, a, b);
        }
    }
}

struct Named(&'static str);

impl PosteriorHandler for Named {

    fn name(&self) -> &'static str {
        self.0
    }

    fn description(&self) -> Description {
        vec![(Accepts::AnyDistribution, Arity::ZeroOrMore)]
    }

    fn compute_posterior(&self, pi : &Message, _lambda : &Message) -> Result<Message, PropagationError> {
        Ok(pi.clone())
    }

}

#[test]
fn resolver_prefers_counts_then_falls_back() {
    let mut r = Registry::empty();
    r.posterior.register_exact(&[Kind::Gaussian, Kind::Uniform], Arc::new(Named("exact")));
    r.posterior.register(&[Kind::Gaussian, Kind::Uniform], Arc::new(Named("loose")));
    r.posterior.register(&[Kind::Uniform], Arc::new(Named("uniforms")));
    let g : Message = Arc::new(Gaussian::new(0.0, 1.0).unwrap());
    let u : Message = Arc::new(Uniform::new(0.0, 1.0).unwrap());
    assert_eq!(r.resolve_posterior(&g, &u).unwrap().name(), "exact");
    assert_eq!(r.resolve_posterior(&u, &u).unwrap().name(), "uniforms");
    match r.resolve_posterior(&u, &g) {
        Err(PropagationError::HandlerNotFound { exact, loose }) => {
            assert_eq!(exact, HandlerKey::with_counts(Operation::Posterior, vec![Kind::Uniform, Kind::Gaussian]));
            assert_eq!(loose.to_string(), "posterior:UniformGaussian");
        },
        _ => panic!("Expected a missing handler")
    }
    assert!(r.validate().is_empty());

    let mut lambdas = Registry::empty();
    lambdas.lambda.register(&[Kind::Gaussian], Arc::new(belief::dispatch::lambda::GaussianProduct));
    let three = vec![g.clone(), g.clone(), g.clone()];
    let key = HandlerKey::with_counts(Operation::Lambda, three.iter().map(|m| m.kind()));
    assert_eq!(key.to_string(), "lambda:3Gaussian");
    assert!(lambdas.resolve_lambda(&three).is_ok());
}

#[test]
fn noninformative_lambda_is_identity() {
    let engine = Engine::new(Registry::empty());
    let none : Message = Arc::new(Noninformative);
    for pi in vec![
        Arc::new(Gaussian::new(3.0, 2.0).unwrap()) as Message,
        Arc::new(Discrete::univariate(vec![0.3, 0.7]).unwrap()) as Message,
        Arc::new(Uniform::new(0.0, 1.0).unwrap()) as Message
    ] {
        let post = engine.compute_posterior(&pi, &none).unwrap();
        assert!(Arc::ptr_eq(&post, &pi));
    }
}

struct Reachable(Message);

impl RemoteVariable for Reachable {

    fn pi_message(&self, _child : &str) -> Result<Message, TransportError> {
        Ok(self.0.clone())
    }

}

struct Unreachable;

impl RemoteVariable for Unreachable {

    fn pi_message(&self, _child : &str) -> Result<Message, TransportError> {
        Err(TransportError::Unreachable { host : String::from("sensor-1"), reason : String::from("connection refused") })
    }

}

#[test]
fn remote_parents() {
    init_tracing();
    let mut bn = BeliefNetwork::new("remote");
    bn.add_remote_variable("r", Box::new(Reachable(Arc::new(Gaussian::new(1.0, 1.0).unwrap())))).unwrap();
    bn.add_variable("y", linear(3.0, 1.0, 1.0), &["r"]).unwrap();
    assert!((bn.posterior("y").unwrap().expected_value().unwrap() - 4.0).abs() < EPS);
    assert!(matches!(bn.posterior("r"), Err(PropagationError::Remote(_))));
    assert!(matches!(bn.assign_evidence("r", 0.0), Err(PropagationError::Remote(_))));

    let mut bn = BeliefNetwork::new("remote");
    bn.add_remote_variable("r", Box::new(Unreachable)).unwrap();
    bn.add_variable("y", linear(3.0, 1.0, 1.0), &["r"]).unwrap();
    match bn.posterior("y") {
        Err(e @ PropagationError::Transport { .. }) => assert!(e.is_edge_failure()),
        other => panic!("Expected a transport failure, found {:?}", other.map(|m| m.kind()))
    }
}

fn unsupported_pair(policy : EdgeFailurePolicy) -> BeliefNetwork {
    let mut config = Config::default();
    config.propagation.edge_failure = policy;
    let mut bn = BeliefNetwork::with_config("pair", config);
    bn.add_variable("u", Box::new(Uniform::new(0.0, 1.0).unwrap()), &[]).unwrap();
    bn.add_variable("g", gaussian(0.0, 1.0), &[]).unwrap();
    let cg = ConditionalGaussian::new(DVector::from_vec(vec![1.0, 1.0]), 0.0, 1.0).unwrap();
    bn.add_variable("y", Box::new(cg), &["u", "g"]).unwrap();
    bn.assign_evidence("y", 1.0).unwrap();
    bn
}

#[test]
fn edge_failure_policies() {
    init_tracing();
    let mut strict = unsupported_pair(EdgeFailurePolicy::Fail);
    match strict.posterior("g") {
        Err(PropagationError::Edge { direction, from, to, .. }) => {
            assert_eq!((direction, &from[..], &to[..]), ("lambda-message", "y", "g"));
        },
        other => panic!("Expected an edge failure, found {:?}", other.map(|m| m.kind()))
    }
    assert!(strict.propagate().is_err());

    let mut lenient = unsupported_pair(EdgeFailurePolicy::Noninformative);
    let g = lenient.posterior("g").unwrap();
    assert!((g.expected_value().unwrap()).abs() < EPS);
    assert_eq!(lenient.failures().len(), 1);
    let report = lenient.propagate().unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].from, "y");
    assert!(report.unresolved.is_empty());
    assert_eq!(report.belief("y").unwrap().kind, "GaussianDelta");

    // Uniform prior times the Gaussian lambda N(1, 2) has no closed form.
    assert_eq!(report.belief("u").unwrap().kind, "Mixture");
    let u = lenient.posterior("u").unwrap().expected_value().unwrap();
    assert!(u > 0.51 && u < 0.53, "{}", u);
    assert!(report.to_json().unwrap().contains("\"beliefs\""));

    lenient.clear_all_evidence();
    assert!(lenient.failures().is_empty());
}

fn alternating_parents(bn : &mut BeliefNetwork, n : usize, prior : impl Fn() -> Box<dyn ConditionalDistribution>) -> Vec<String> {
    let names : Vec<String> = (1..=n).map(|i| format!("p{}", i)).collect();
    for name in names.iter() {
        bn.add_variable(name, prior(), &[]).unwrap();
    }
    names
}

#[test]
fn linear_gaussian_with_alternating_evidence() {
    init_tracing();
    let mut bn = BeliefNetwork::new("sum");
    let names = alternating_parents(&mut bn, 7, || gaussian(0.0, 1.0));
    let parents : Vec<&str> = names.iter().map(|s| s.as_str()).collect();
    let cg = ConditionalGaussian::new(DVector::from_element(7, 1.0), 0.0, 1.0).unwrap();
    bn.add_variable("y", Box::new(cg), &parents).unwrap();
    bn.assign_evidence("p2", 1.0).unwrap();
    bn.assign_evidence("p4", -0.5).unwrap();
    bn.assign_evidence("p6", 0.5).unwrap();

    // Parents alternate unobserved and observed: seven runs after the conditional.
    let pi = bn.pi("y").unwrap();
    assert!((pi.expected_value().unwrap() - 1.0).abs() < EPS);
    assert!((pi.sqrt_variance().unwrap() - 5.0f64.sqrt()).abs() < EPS);

    // The lambda-message y -> p7 sees the observed lambda then six alternating pi-messages.
    bn.assign_evidence("y", 3.0).unwrap();
    let l = bn.lambda_message("p7", "y").unwrap();
    assert!((l.expected_value().unwrap() - 2.0).abs() < EPS);
    assert!((l.sqrt_variance().unwrap() - 2.0).abs() < EPS);
    let p7 = bn.posterior("p7").unwrap();
    assert!((p7.expected_value().unwrap() - 0.4).abs() < EPS);
    assert!((p7.sqrt_variance().unwrap() - 0.8f64.sqrt()).abs() < EPS);
}

#[test]
fn discrete_table_with_alternating_evidence() {
    init_tracing();
    let n = 7;
    let mut bn = BeliefNetwork::new("vote");
    let names = alternating_parents(&mut bn, n, || Box::new(Discrete::univariate(vec![0.5, 0.5]).unwrap()));
    let parents : Vec<&str> = names.iter().map(|s| s.as_str()).collect();

    // The child is on with probability equal to the share of parents on.
    let rows : Vec<Vec<f64>> = (0..(1usize << n))
        .map(|r| {
            let on = r.count_ones() as f64 / n as f64;
            vec![1.0 - on, on]
        })
        .collect();
    let table = ConditionalDiscrete::new(2, vec![2; n], rows).unwrap();
    bn.add_variable("vote", Box::new(table), &parents).unwrap();
    for p in ["p2", "p4", "p6"].iter() {
        bn.assign_evidence(p, 1.0).unwrap();
    }

    let pi = bn.pi("vote").unwrap();
    assert!((pi.density(&scalar(1.0)).unwrap() - 5.0 / 7.0).abs() < EPS);

    bn.assign_evidence("vote", 1.0).unwrap();
    let p7 = bn.posterior("p7").unwrap();
    assert!((p7.density(&scalar(1.0)).unwrap() - 0.55).abs() < EPS);
}

#[test]
fn network_from_text() {
    init_tracing();
    let text = r#"
        # Sensor fusion with a discrete mode selector.
        belief-network fusion
        {
            variable mode { distribution Discrete { dimensions { 2 } probabilities { 0.6 0.4 } } }
            variable reading
            {
                parents { mode }
                distribution ConditionalDiscrete
                {
                    dimensions-child { 3 }
                    dimensions-parents { 2 }
                    probabilities { 0.7 0.2 0.1  0.1 0.3 0.6 }
                }
            }
        }
    "#;
    let spec = NetworkSpec::parse(text).unwrap();
    let mut bn = BeliefNetwork::from_spec(spec, Engine::default(), Config::default()).unwrap();
    bn.assign_evidence("reading", 2.0).unwrap();
    let report = bn.propagate().unwrap();
    assert!(report.unresolved.is_empty());
    let mode = bn.posterior("mode").unwrap();
    let expected = 0.4 * 0.6 / (0.6 * 0.1 + 0.4 * 0.6);
    assert!((mode.density(&scalar(1.0)).unwrap() - expected).abs() < EPS);

    let broken = "belief-network b { variable y { parents { x } distribution ConditionalGaussian { \
        conditional-mean-multiplier { 1 } conditional-variance { 1 } } } }";
    let spec = NetworkSpec::parse(broken).unwrap();
    assert!(BeliefNetwork::from_spec(spec, Engine::default(), Config::default()).is_err());
}

#[test]
fn ancestral_sampling_follows_conditionals() {
    let mut bn = BeliefNetwork::new("chain");
    bn.add_variable("x", gaussian(0.0, 1.0), &[]).unwrap();
    bn.add_variable("y", linear(2.0, 1.0, 1.0), &["x"]).unwrap();
    let mut rng = StdRng::seed_from_u64(7);
    let n = 4000;
    let mut total = 0.0;
    for _ in 0..n {
        let s = bn.sample_joint(&mut rng).unwrap();
        assert_eq!(s.len(), 2);
        total += s["y"][0];
    }
    assert!((total / n as f64 - 1.0).abs() < 0.2);
}

#[test]
fn config_from_file() {
    let path = std::env::temp_dir().join("belief-config-test.json");
    std::fs::write(&path, r#"{ "fit" : { "max_iterations" : 20 }, "support_epsilon" : 0.01 }"#).unwrap();
    let config = Config::load_from_path(&path).unwrap();
    assert_eq!(config.fit.max_iterations, 20);
    assert_eq!(config.fit.tolerance, FitParams::default().tolerance);
    assert_eq!(config.support_epsilon, 0.01);
    assert_eq!(config.propagation.edge_failure, EdgeFailurePolicy::Fail);
    let _ = std::fs::remove_file(&path);
}

proptest! {

    #[test]
    fn gaussian_support_holds_its_mass(m in -100.0..100.0f64, s in 0.01..100.0f64, eps in 1e-6..0.1f64) {
        let g = Gaussian::new(m, s).unwrap();
        let (lo, hi) = g.effective_support(eps).unwrap();
        prop_assert!(lo < hi);
        let mass = g.cdf(hi).unwrap() - g.cdf(lo).unwrap();
        prop_assert!(mass >= 1.0 - eps - 1e-6);
        prop_assert!(g.density(&scalar(lo)).unwrap() >= 0.0);
    }

    #[test]
    fn separated_mixture_support_holds_its_mass(
        d in 5.0..50.0f64,
        s1 in 0.1..1.0f64,
        s2 in 0.1..1.0f64,
        w in 0.05..0.95f64,
        eps in 1e-6..0.1f64
    ) {
        let m = Mixture::new(vec![
            Box::new(Gaussian::new(-d, s1).unwrap()),
            Box::new(Gaussian::new(d, s2).unwrap())
        ], vec![w, 1.0 - w]).unwrap();
        let (lo, hi) = m.effective_support(eps).unwrap();
        prop_assert!(lo < hi);
        prop_assert!(m.cdf(hi).unwrap() - m.cdf(lo).unwrap() >= 1.0 - eps - 1e-6);
    }

    #[test]
    fn discrete_support_holds_its_mass(p in prop::collection::vec(0.001..1.0f64, 2..12), eps in 1e-6..0.1f64) {
        let d = Discrete::univariate(p).unwrap();
        let (lo, hi) = d.effective_support(eps).unwrap();
        prop_assert!(lo <= hi);
        // States lo..=hi, so the lower bound is taken just below lo.
        let mass = d.cdf(hi).unwrap() - d.cdf(lo - 1.0).unwrap();
        prop_assert!(mass >= 1.0 - eps - 1e-9);
    }

    #[test]
    fn uniform_support_holds_its_mass(a in -1e3..1e3f64, w in 1e-3..1e3f64, eps in 1e-6..0.1f64) {
        let u = Uniform::new(a, a + w).unwrap();
        let (lo, hi) = u.effective_support(eps).unwrap();
        prop_assert!(lo < hi);
        prop_assert!(u.cdf(hi).unwrap() - u.cdf(lo).unwrap() >= 1.0 - eps - 1e-9);
    }

    #[test]
    fn mixture_density_is_non_negative(w in 0.01..0.99f64, x in -50.0..50.0f64) {
        let m = Mixture::new(vec![
            Box::new(Gaussian::new(-2.0, 0.5).unwrap()),
            Box::new(Uniform::new(0.0, 10.0).unwrap())
        ], vec![w, 1.0 - w]).unwrap();
        prop_assert!(m.density(&scalar(x)).unwrap() >= 0.0);
    }

}
