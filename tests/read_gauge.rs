use anyhow::anyhow;
use gauge_reader::ocr::vision::parse_annotate_response;
use gauge_reader::{
    build_variants, default_plan, read_gauge, GaugeConfigTable, GaugeKind, ImageVariant,
    OcrResponse, OcrWord, ReadingRequest, RejectReason, TextDetector,
};

/// Replays canned OCR results, one per call, and counts the calls.
struct Replay {
    script: Vec<anyhow::Result<OcrResponse>>,
    calls: usize,
}

impl Replay {
    fn new(script: Vec<anyhow::Result<OcrResponse>>) -> Self {
        Self { script, calls: 0 }
    }
}

impl TextDetector for Replay {
    fn name(&self) -> &str {
        "replay"
    }

    fn detect(&mut self, _image: &[u8]) -> anyhow::Result<OcrResponse> {
        let i = self.calls;
        self.calls += 1;
        match self.script.get_mut(i) {
            Some(slot) => std::mem::replace(slot, Err(anyhow!("already replayed"))),
            None => Err(anyhow!("script exhausted at call {i}")),
        }
    }
}

fn words(items: &[(&str, f64, f64, f64, f64)]) -> OcrResponse {
    OcrResponse::new(
        items.iter().map(|w| w.0).collect::<Vec<_>>().join(" "),
        items
            .iter()
            .map(|&(text, x, y, w, h)| OcrWord::from_rect(text, x, y, w, h))
            .collect(),
    )
}

fn hour_meter_display() -> OcrResponse {
    words(&[
        ("0364", 100.0, 100.0, 160.0, 40.0),
        ("7", 270.0, 102.0, 30.0, 36.0),
        ("h", 310.0, 110.0, 15.0, 20.0),
    ])
}

fn variants(names: &[&str]) -> Vec<ImageVariant> {
    names
        .iter()
        .map(|name| ImageVariant {
            name: name.to_string(),
            bytes: name.as_bytes().to_vec(),
        })
        .collect()
}

fn request(kind: GaugeKind, names: &[&str], reference_value: Option<f64>) -> ReadingRequest {
    ReadingRequest {
        kind,
        image_variants: variants(names),
        reference_value,
    }
}

#[test]
fn stops_at_first_variant_with_a_reading() {
    let table = GaugeConfigTable::default();
    let mut detector = Replay::new(vec![
        Ok(OcrResponse::default()),
        Ok(hour_meter_display()),
        Ok(hour_meter_display()),
    ]);
    let req = request(GaugeKind::Horimetro, &["full-gray", "crop-main-gray", "crop-tight-thresh"], None);

    let response = read_gauge(&table, &req, &mut detector).unwrap();

    assert_eq!(detector.calls, 2);
    assert!((response.value.unwrap() - 364.7).abs() < 1e-9);
    assert_eq!(response.best_input_label, "364,7");
    assert_eq!(response.variant_name.as_deref(), Some("crop-main-gray"));
    assert_eq!(response.used_tokens.len(), 2);
    assert_eq!(response.trace.len(), 2);
    assert_eq!(response.trace[0].reject, Some(RejectReason::NoDigitTokens));
    assert_eq!(response.trace[1].reject, None);
}

#[test]
fn exhaustion_tries_every_variant_once() {
    let table = GaugeConfigTable::default();
    let mut detector = Replay::new(vec![
        Ok(OcrResponse::default()),
        Ok(words(&[("TOTAL", 0.0, 0.0, 80.0, 20.0)])),
        Ok(words(&[("12", 0.0, 0.0, 40.0, 20.0)])),
    ]);
    let req = request(GaugeKind::Odometro, &["a", "b", "c"], None);

    let response = read_gauge(&table, &req, &mut detector).unwrap();

    assert_eq!(detector.calls, 3);
    assert_eq!(response.value, None);
    assert!(response.best_input_label.is_empty());
    assert!(response.used_tokens.is_empty());
    assert_eq!(response.variant_name.as_deref(), Some("c"));
    let names: Vec<&str> = response.trace.iter().map(|t| t.variant_name.as_str()).collect();
    assert_eq!(names, ["a", "b", "c"]);
}

#[test]
fn ocr_failure_is_an_error_not_an_empty_reading() {
    let table = GaugeConfigTable::default();
    let mut detector = Replay::new(vec![
        Ok(OcrResponse::default()),
        Err(anyhow!("503 from provider")),
        Ok(hour_meter_display()),
    ]);
    let req = request(GaugeKind::Horimetro, &["a", "b", "c"], None);

    let err = read_gauge(&table, &req, &mut detector).unwrap_err();

    assert_eq!(detector.calls, 2);
    let chain = format!("{err:#}");
    assert!(chain.contains("variant b"), "{chain}");
    assert!(chain.contains("503 from provider"), "{chain}");
}

#[test]
fn detached_tenth_round_trips() {
    let table = GaugeConfigTable::default();
    for v in [0.0_f64, 12.3, 364.7, 1234.5, 98765.4] {
        let integer = v.trunc() as u64;
        let tenth = ((v - v.trunc()) * 10.0).round() as u8;
        let display = words(&[
            (format!("{integer:05}").as_str(), 100.0, 100.0, 200.0, 40.0),
            (tenth.to_string().as_str(), 310.0, 102.0, 30.0, 36.0),
        ]);
        let mut detector = Replay::new(vec![Ok(display)]);
        let req = request(GaugeKind::Horimetro, &["full-gray"], None);

        let response = read_gauge(&table, &req, &mut detector).unwrap();
        let value = response.value.unwrap();
        assert!((value - v).abs() < 1e-9, "{v} read as {value}");
        assert_eq!(response.best_input_label, format!("{integer},{tenth}"));
    }
}

#[test]
fn readings_stay_within_kind_bounds() {
    let mut table = GaugeConfigTable::default();
    table.abastecimento.plausible_max = 500.0;

    let pump = |sale: &str, tenth: &str| {
        words(&[
            ("LITROS", 100.0, 40.0, 120.0, 20.0),
            (sale, 100.0, 100.0, 120.0, 50.0),
            (tenth, 230.0, 100.0, 40.0, 50.0),
            ("PRECO", 100.0, 400.0, 120.0, 20.0),
        ])
    };

    let mut detector = Replay::new(vec![Ok(pump("452", "1"))]);
    let ok = read_gauge(&table, &request(GaugeKind::Abastecimento, &["v"], None), &mut detector).unwrap();
    assert!((ok.value.unwrap() - 452.1).abs() < 1e-9);

    let mut detector = Replay::new(vec![Ok(pump("952", "1"))]);
    let high = read_gauge(&table, &request(GaugeKind::Abastecimento, &["v"], None), &mut detector).unwrap();
    assert_eq!(high.value, None);
    assert_eq!(high.trace[0].reject, Some(RejectReason::RangeReject));
}

#[test]
fn rpm_scale_is_never_read_as_the_counter() {
    let table = GaugeConfigTable::default();
    let rpm = [
        ("0", 100.0, 100.0, 20.0, 30.0),
        ("1", 300.0, 100.0, 20.0, 30.0),
        ("2", 500.0, 100.0, 20.0, 30.0),
        ("3", 700.0, 100.0, 20.0, 30.0),
        ("4", 900.0, 100.0, 20.0, 30.0),
    ];

    let mut detector = Replay::new(vec![Ok(words(&rpm))]);
    let scale_only = read_gauge(&table, &request(GaugeKind::Horimetro, &["v"], None), &mut detector).unwrap();
    assert_eq!(scale_only.value, None);
    assert_eq!(scale_only.trace[0].reject, Some(RejectReason::StructuralReject));

    let mut with_display = rpm.to_vec();
    with_display.extend([
        ("03", 400.0, 400.0, 60.0, 32.0),
        ("64", 462.0, 400.0, 60.0, 32.0),
        ("7", 524.0, 401.0, 30.0, 30.0),
    ]);
    let mut detector = Replay::new(vec![Ok(words(&with_display))]);
    let read = read_gauge(&table, &request(GaugeKind::Horimetro, &["v"], None), &mut detector).unwrap();
    assert!((read.value.unwrap() - 364.7).abs() < 1e-9);
    assert_eq!(read.trace[0].chosen_method.as_deref(), Some("compact-row"));
    assert!(read.used_tokens.iter().all(|t| t.cy > 300.0));
}

#[test]
fn reference_value_breaks_the_tie_toward_continuity() {
    let table = GaugeConfigTable::default();
    let two_counters = || {
        words(&[
            ("99990", 100.0, 100.0, 200.0, 40.0),
            ("12000", 100.0, 300.0, 200.0, 40.0),
        ])
    };

    let mut detector = Replay::new(vec![Ok(two_counters())]);
    let blind = read_gauge(&table, &request(GaugeKind::Horimetro, &["v"], None), &mut detector).unwrap();
    assert_eq!(blind.value, Some(9999.0));

    let mut detector = Replay::new(vec![Ok(two_counters())]);
    let guided =
        read_gauge(&table, &request(GaugeKind::Horimetro, &["v"], Some(1205.0)), &mut detector).unwrap();
    assert_eq!(guided.value, Some(1200.0));
    assert_eq!(guided.best_input_label, "1200,0");

    // Only hour-meters are cumulative; other kinds ignore the reference.
    let mut detector = Replay::new(vec![Ok(words(&[("0123456", 150.0, 400.0, 280.0, 50.0)]))]);
    let odo =
        read_gauge(&table, &request(GaugeKind::Odometro, &["v"], Some(5.0)), &mut detector).unwrap();
    assert_eq!(odo.value, Some(123_456.0));
}

#[test]
fn vision_payloads_drive_the_pipeline() {
    let body = r#"{
      "responses": [{
        "textAnnotations": [
          { "description": "0364 7\nh" },
          { "description": "0364",
            "boundingPoly": { "vertices": [{"x":100,"y":100},{"x":260,"y":100},{"x":260,"y":140},{"x":100,"y":140}] } },
          { "description": "7",
            "boundingPoly": { "vertices": [{"x":270,"y":102},{"x":300,"y":102},{"x":300,"y":138},{"x":270,"y":138}] } },
          { "description": "h",
            "boundingPoly": { "vertices": [{"x":310,"y":110},{"x":325,"y":110},{"x":325,"y":130},{"x":310,"y":130}] } }
        ]
      }]
    }"#;
    let table = GaugeConfigTable::default();
    let mut detector = Replay::new(vec![parse_annotate_response(body)]);

    let response = read_gauge(&table, &request(GaugeKind::Horimetro, &["v"], None), &mut detector).unwrap();

    assert_eq!(response.best_input_label, "364,7");
    assert_eq!(response.trace[0].full_text, "0364 7\nh");
    assert_eq!(response.trace[0].token_count, 3);
}

#[test]
fn generated_variants_reach_the_detector_in_plan_order() {
    struct Decoding {
        sizes: Vec<(u32, u32)>,
    }

    impl TextDetector for Decoding {
        fn name(&self) -> &str {
            "decoding"
        }

        fn detect(&mut self, image: &[u8]) -> anyhow::Result<OcrResponse> {
            let img = image::load_from_memory(image)?;
            self.sizes.push((img.width(), img.height()));
            Ok(OcrResponse::default())
        }
    }

    let mut png = Vec::new();
    image::DynamicImage::ImageLuma8(image::GrayImage::from_pixel(400, 200, image::Luma([90])))
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();

    let image_variants = build_variants(&png, &default_plan(GaugeKind::Odometro)).unwrap();
    let req = ReadingRequest {
        kind: GaugeKind::Odometro,
        image_variants,
        reference_value: None,
    };
    let mut detector = Decoding { sizes: Vec::new() };
    let response = read_gauge(&GaugeConfigTable::default(), &req, &mut detector).unwrap();

    assert_eq!(response.value, None);
    assert_eq!(detector.sizes.len(), 3);
    assert_eq!(detector.sizes[0], (400, 200));
    assert!(detector.sizes[1].0 < 400 && detector.sizes[2].0 < detector.sizes[1].0);
}

fn blank_png(width: u32, height: u32) -> Vec<u8> {
    let mut png = Vec::new();
    image::DynamicImage::ImageLuma8(image::GrayImage::from_pixel(width, height, image::Luma([200])))
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();
    png
}

fn sized_request(kind: GaugeKind, width: u32, height: u32) -> ReadingRequest {
    ReadingRequest {
        kind,
        image_variants: vec![ImageVariant {
            name: "crop-tight-thresh".into(),
            bytes: blank_png(width, height),
        }],
        reference_value: None,
    }
}

#[test]
fn split_display_in_a_tight_crop_is_read() {
    let table = GaugeConfigTable::default();
    let display = || {
        words(&[
            ("03", 20.0, 20.0, 60.0, 40.0),
            ("64", 82.0, 20.0, 60.0, 40.0),
            ("7", 144.0, 22.0, 30.0, 38.0),
        ])
    };

    let mut detector = Replay::new(vec![Ok(display())]);
    let sized = read_gauge(&table, &sized_request(GaugeKind::Horimetro, 320, 90), &mut detector).unwrap();
    assert_eq!(sized.best_input_label, "364,7");

    let mut detector = Replay::new(vec![Ok(display())]);
    let r#unsized = read_gauge(&table, &request(GaugeKind::Horimetro, &["v"], None), &mut detector).unwrap();
    assert_eq!(r#unsized.best_input_label, "364,7");
}

#[test]
fn variant_image_width_feeds_the_span_filter() {
    let table = GaugeConfigTable::default();
    // Compact glyphs running across almost the whole 200 px image.
    let wide_row = || {
        words(&[
            ("0", 5.0, 20.0, 45.0, 40.0),
            ("1", 53.0, 20.0, 45.0, 40.0),
            ("2", 101.0, 20.0, 45.0, 40.0),
            ("3", 149.0, 20.0, 45.0, 40.0),
        ])
    };

    let mut detector = Replay::new(vec![Ok(wide_row())]);
    let response = read_gauge(&table, &sized_request(GaugeKind::Horimetro, 200, 90), &mut detector).unwrap();
    assert_eq!(response.value, None);
    assert_eq!(response.trace[0].reject, Some(RejectReason::StructuralReject));
    let compact_row = &response.trace[0].strategies[1];
    assert!(compact_row.rejected[0].reason.starts_with("span ratio"));
}

#[test]
fn provider_page_size_is_kept_over_the_image_header() {
    let table = GaugeConfigTable::default();
    let sale = words(&[("452", 100.0, 300.0, 120.0, 50.0), ("1", 230.0, 300.0, 40.0, 50.0)]);

    // The header says 400 px tall, which would push the readout below the band.
    let mut detector = Replay::new(vec![Ok(sale.clone().with_page(480.0, 640.0))]);
    let kept = read_gauge(&table, &sized_request(GaugeKind::Abastecimento, 480, 400), &mut detector).unwrap();
    assert_eq!(kept.best_input_label, "452,1");

    let mut detector = Replay::new(vec![Ok(sale)]);
    let from_header =
        read_gauge(&table, &sized_request(GaugeKind::Abastecimento, 480, 400), &mut detector).unwrap();
    assert_eq!(from_header.value, None);
}
