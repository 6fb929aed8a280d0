use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use model::{DenseNet, DenseNetConfig};

/// A scaled-down architecture that keeps every structural feature of the
/// default network (stem, two blocks, one transition, head) but runs fast.
fn small_config() -> DenseNetConfig {
    DenseNetConfig {
        num_labels: 5,
        in_channels: 1,
        input_height: 13,
        input_width: 9,
        growth_rate: 2,
        block_config: vec![2, 3],
        num_init_features: 4,
        bn_size: 2,
        drop_rate: 0.0,
        prob_eps: 1e-3,
        final_features: None,
    }
}

fn build_model(varmap: &VarMap, config: DenseNetConfig) -> Result<DenseNet> {
    let vb = VarBuilder::from_varmap(varmap, DType::F32, &Device::Cpu);
    Ok(DenseNet::new(config, vb)?)
}

fn random_batch(config: &DenseNetConfig, batch: usize) -> Result<Tensor> {
    Ok(Tensor::randn(
        0f32,
        1.0,
        (batch, config.input_dim()),
        &Device::Cpu,
    )?)
}

#[test]
fn forward_produces_label_scores() -> Result<()> {
    let config = small_config();
    let varmap = VarMap::new();
    let model = build_model(&varmap, config.clone())?;

    for batch in [1usize, 3] {
        let input = random_batch(&config, batch)?;
        let scores = model.forward(&input, false, false)?;
        assert_eq!(scores.dims(), &[batch, config.num_labels]);
        assert_eq!(scores.dtype(), DType::F32);
    }
    Ok(())
}

#[test]
fn small_plan_traces_channels_and_flatten() -> Result<()> {
    let varmap = VarMap::new();
    let model = build_model(&varmap, small_config())?;
    let plan = model.plan();

    assert_eq!(plan.stem_spatial, (7, 9));
    assert_eq!(plan.stages[0].channels_after_block, 8);
    assert_eq!(plan.stages[0].channels_after_transition, Some(4));
    assert_eq!(plan.stages[1].channels_after_block, 10);
    assert_eq!(plan.stages[1].channels_after_transition, None);
    assert_eq!(plan.final_channels, 10);
    assert_eq!(plan.head_spatial, (3, 4));
    assert_eq!(plan.flatten_dim, 120);
    Ok(())
}

#[test]
fn probabilities_are_clamped_and_rows_sum_to_one() -> Result<()> {
    let config = small_config();
    let varmap = VarMap::new();
    let model = build_model(&varmap, config.clone())?;

    let input = random_batch(&config, 4)?;
    let probs = model.forward(&input, false, true)?;
    assert_eq!(probs.dims(), &[4, config.num_labels]);

    let eps = config.prob_eps as f32;
    let rows = probs.to_vec2::<f32>()?;
    for row in &rows {
        for &p in row {
            assert!(p >= eps, "probability {p} fell below the clamp floor");
            assert!(p <= 1.0 - eps, "probability {p} exceeded the clamp ceiling");
        }
        let sum: f32 = row.iter().sum();
        assert!((sum - 1.0).abs() < 1e-4, "row sums to {sum}");
    }
    Ok(())
}

#[test]
fn aggressive_clamp_floors_every_probability() -> Result<()> {
    // With five labels and a 0.4 clamp the softmax output cannot satisfy the
    // floor on its own, so every entry must land on a clamp boundary.
    let config = DenseNetConfig {
        prob_eps: 0.4,
        ..small_config()
    };
    let varmap = VarMap::new();
    let model = build_model(&varmap, config.clone())?;

    let input = random_batch(&config, 2)?;
    let probs = model.forward(&input, false, true)?.to_vec2::<f32>()?;
    for row in &probs {
        for &p in row {
            assert!((0.4..=0.6).contains(&p), "clamp should bound {p}");
        }
        assert!(row.iter().any(|&p| (p - 0.4).abs() < 1e-6));
    }
    Ok(())
}

#[test]
fn evaluation_forward_is_deterministic_without_dropout() -> Result<()> {
    let config = small_config();
    let varmap = VarMap::new();
    let model = build_model(&varmap, config.clone())?;

    let input = random_batch(&config, 2)?;
    let first = model.forward(&input, false, false)?.to_vec2::<f32>()?;
    let second = model.forward(&input, false, false)?.to_vec2::<f32>()?;
    assert_eq!(first, second, "repeated evaluation must be byte-identical");

    use candle_nn::ModuleT;
    let via_trait = model.forward_t(&input, false)?.to_vec2::<f32>()?;
    assert_eq!(first, via_trait);
    Ok(())
}

#[test]
fn ill_shaped_inputs_are_rejected() -> Result<()> {
    let config = small_config();
    let varmap = VarMap::new();
    let model = build_model(&varmap, config.clone())?;

    let too_wide = Tensor::zeros((2, config.input_dim() + 1), DType::F32, &Device::Cpu)?;
    assert!(model.forward(&too_wide, false, false).is_err());

    let flat = Tensor::zeros(config.input_dim(), DType::F32, &Device::Cpu)?;
    assert!(model.forward(&flat, false, false).is_err());
    Ok(())
}

#[test]
fn independent_builds_differ_only_in_random_weights() -> Result<()> {
    let first = VarMap::new();
    let second = VarMap::new();
    let _ = build_model(&first, small_config())?;
    let _ = build_model(&second, small_config())?;

    let conv_a = first.data().lock().unwrap()["features.conv0.weight"]
        .as_tensor()
        .flatten_all()?
        .to_vec1::<f32>()?;
    let conv_b = second.data().lock().unwrap()["features.conv0.weight"]
        .as_tensor()
        .flatten_all()?
        .to_vec1::<f32>()?;
    assert_ne!(conv_a, conv_b, "conv weights come from independent draws");

    for varmap in [&first, &second] {
        let vars = varmap.data().lock().unwrap();
        let norm = vars["features.norm5.weight"].as_tensor().to_vec1::<f32>()?;
        assert!(norm.iter().all(|&w| w == 1.0), "norm scales start at one");
        let bias = vars["classifier.bias"].as_tensor().to_vec1::<f32>()?;
        assert!(bias.iter().all(|&b| b == 0.0), "classifier bias starts at zero");
    }
    Ok(())
}

#[test]
fn default_architecture_classifies_a_full_frame() -> Result<()> {
    let config = DenseNetConfig {
        // Pin the flatten size to the constant the original hard-coded; the
        // build fails loudly if block_config ever drifts away from it.
        final_features: Some(780),
        ..DenseNetConfig::default()
    };
    assert_eq!(config.input_dim(), 2 * 129 * 21);

    let varmap = VarMap::new();
    let model = build_model(&varmap, config.clone())?;
    assert_eq!(model.plan().flatten_dim, 780);

    let input = random_batch(&config, 1)?;
    let scores = model.forward(&input, false, false)?;
    assert_eq!(scores.dims(), &[1, config.num_labels]);
    Ok(())
}
