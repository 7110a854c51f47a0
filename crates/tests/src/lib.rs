//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 示例配置可加载
//! - 多雷达端到端测试（TCP 桥接 / 合成数据）
//! - 输出格式校验（JSON lines / UDP TLV）

#[cfg(test)]
mod contract_tests {
    #[test]
    fn demo_config_is_valid() {
        let content = include_str!("../../../demos/dual_radar.toml");
        let blueprint = config_loader::ConfigLoader::load_from_str(
            content,
            config_loader::ConfigFormat::Toml,
        )
        .unwrap();

        assert_eq!(blueprint.radars.len(), 2);
        assert!(!blueprint.sinks.is_empty());
        assert_eq!(blueprint.fusion.output_rate_hz, 20.0);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::{BTreeSet, HashMap};
    use std::time::Duration;

    use contracts::wire::encode_target_frame;
    use contracts::{
        ByteSourceConfig, FacingAngle, FusedFrame, FusionConfig, IngestConfig, PipelineClock,
        RadarConfig, RawTrack, SinkConfig, SinkType, SyntheticConfig, Vector3,
    };
    use dispatcher::create_dispatcher;
    use fusion_engine::{FusionScheduler, SchedulerStats};
    use ingestion::IngestionPipeline;
    use tokio::io::AsyncWriteExt;
    use tokio::net::{TcpListener, UdpSocket};
    use tokio::sync::{mpsc, watch};
    use tokio::task::JoinHandle;

    fn radar(name: &str, offset: [f64; 3], source: ByteSourceConfig) -> RadarConfig {
        RadarConfig {
            name: name.to_string(),
            position_offset: offset,
            facing_angle: FacingAngle::default(),
            xlim: None,
            ylim: None,
            zlim: None,
            source,
            ingest: IngestConfig::default(),
        }
    }

    /// Serial-over-TCP bridge replaying one fixed target every 25 ms
    async fn spawn_bridge(local_id: u32, position: Vector3) -> (String, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            for frame_number in 0..400u32 {
                let track = RawTrack::new(
                    local_id,
                    position,
                    Vector3::new(0.0, 0.5, 0.0),
                    Vector3::ZERO,
                    1.0,
                    0.9,
                );
                let bytes = encode_target_frame(frame_number, &[track]);
                if stream.write_all(&bytes).await.is_err() {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        });
        (address, handle)
    }

    struct RunOutput {
        scheduler: SchedulerStats,
        sinks: Vec<(String, dispatcher::MetricsSnapshot)>,
        ingest: Vec<ingestion::MetricsSnapshot>,
    }

    /// radars -> ingestion -> scheduler -> dispatcher, stopped after `run_for`
    async fn run_pipeline(
        radars: Vec<RadarConfig>,
        sinks: Vec<SinkConfig>,
        run_for: Duration,
    ) -> RunOutput {
        let clock = PipelineClock::start();
        let (stop_tx, stop_rx) = watch::channel(false);

        let mut ingestion = IngestionPipeline::new(clock, stop_rx.clone());
        ingestion.spawn_all(&radars).unwrap();
        let ingest_metrics = ingestion.metrics();

        let scheduler =
            FusionScheduler::new(FusionConfig::default(), ingestion.take_receivers(), clock);
        let (fused_tx, fused_rx) = mpsc::channel::<FusedFrame>(64);
        let scheduler_handle = tokio::spawn(scheduler.run(fused_tx, stop_rx));

        let dispatcher = create_dispatcher(sinks, fused_rx).await.unwrap();
        let dispatcher_handle = dispatcher.spawn();

        tokio::time::sleep(run_for).await;
        stop_tx.send(true).unwrap();

        assert_eq!(ingestion.join(Duration::from_secs(2)).await, 0);
        let scheduler = tokio::time::timeout(Duration::from_secs(2), scheduler_handle)
            .await
            .unwrap()
            .unwrap();
        let sinks = tokio::time::timeout(Duration::from_secs(5), dispatcher_handle)
            .await
            .unwrap()
            .unwrap();

        RunOutput {
            scheduler,
            sinks,
            ingest: ingest_metrics.iter().map(|(_, m)| m.snapshot()).collect(),
        }
    }

    fn file_sink(path: &std::path::Path) -> SinkConfig {
        SinkConfig {
            name: "jsonl".to_string(),
            sink_type: SinkType::File,
            queue_capacity: 100,
            params: HashMap::from([("path".to_string(), path.display().to_string())]),
        }
    }

    fn read_frames(path: &std::path::Path) -> Vec<serde_json::Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    /// End-to-end test: two TCP bridges -> fusion -> JSON lines file
    ///
    /// 两个雷达从不同位置观测同一目标：
    /// 1. 世界坐标一致，应合并为一条融合航迹
    /// 2. 全局 ID 在整个运行期间保持不变
    /// 3. 每一行都带有写入时间
    #[tokio::test]
    async fn test_e2e_tcp_radars_merge_into_one_track() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("fused.jsonl");

        // radar2 sits 1 m to the right, so the same object is 1 m closer in its local x
        let (left_addr, left_bridge) = spawn_bridge(7, Vector3::new(2.0, 5.0, 0.0)).await;
        let (right_addr, right_bridge) = spawn_bridge(3, Vector3::new(1.0, 5.0, 0.0)).await;

        let radars = vec![
            radar(
                "left",
                [0.0, 0.0, 0.0],
                ByteSourceConfig::Tcp {
                    address: left_addr,
                    reconnect_backoff_ms: 100,
                },
            ),
            radar(
                "right",
                [1.0, 0.0, 0.0],
                ByteSourceConfig::Tcp {
                    address: right_addr,
                    reconnect_backoff_ms: 100,
                },
            ),
        ];

        let run = tokio::time::timeout(
            Duration::from_secs(15),
            run_pipeline(radars, vec![file_sink(&output)], Duration::from_millis(800)),
        )
        .await
        .expect("pipeline run timed out");
        left_bridge.abort();
        right_bridge.abort();

        assert!(run.ingest.iter().all(|s| s.frames_parsed > 0 && s.parse_errors == 0));
        assert!(run.scheduler.published > 0);
        assert_eq!(run.sinks[0].1.write_count, run.scheduler.published);

        let frames = read_frames(&output);
        assert_eq!(frames.len() as u64, run.scheduler.published);

        let mut ids = BTreeSet::new();
        let mut merged_frames = 0;
        let mut last_cycle = 0;
        for frame in &frames {
            assert!(frame["written_at"].is_string());

            let cycle = frame["cycle"].as_u64().unwrap();
            assert!(cycle > last_cycle);
            last_cycle = cycle;

            let tracks = frame["tracks"].as_array().unwrap();
            assert_eq!(tracks.len(), 1, "same object must not be reported twice");
            let track = &tracks[0];
            ids.insert(track["global_id"].as_u64().unwrap());

            let position = &track["position"];
            assert!((position["x"].as_f64().unwrap() - 2.0).abs() < 1e-4);
            assert!((position["y"].as_f64().unwrap() - 5.0).abs() < 1e-4);

            if track["contributing_sensors"].as_array().unwrap().len() == 2 {
                merged_frames += 1;
            }
        }

        assert_eq!(ids, BTreeSet::from([1]));
        assert!(merged_frames > 0);
    }

    /// End-to-end test: synthetic radars -> fusion -> UDP TLV sink
    ///
    /// 接收端使用雷达自身的解析器解码，目标 ID 即为全局 ID。
    #[tokio::test]
    async fn test_e2e_synthetic_radars_stream_tlv() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = receiver.local_addr().unwrap();

        let synthetic = |id_offset| {
            ByteSourceConfig::Synthetic(SyntheticConfig {
                frame_rate_hz: 40.0,
                num_objects: 2,
                noise_std: 0.02,
                dropout: 0.0,
                id_offset,
                seed: 11,
            })
        };
        let radars = vec![
            radar("radar1", [0.0, 0.0, 1.0], synthetic(0)),
            radar("radar2", [0.5, 0.0, 1.0], synthetic(1000)),
        ];
        let sinks = vec![SinkConfig {
            name: "udp".to_string(),
            sink_type: SinkType::Network,
            queue_capacity: 100,
            params: HashMap::from([
                ("addr".to_string(), addr.to_string()),
                ("format".to_string(), "tlv".to_string()),
            ]),
        }];

        let run = tokio::time::timeout(
            Duration::from_secs(15),
            run_pipeline(radars, sinks, Duration::from_millis(600)),
        )
        .await
        .expect("pipeline run timed out");
        assert!(run.scheduler.published > 0);
        assert!(run.scheduler.fusion.merged_clusters > 0);

        let mut buf = vec![0u8; 65536];
        let n = tokio::time::timeout(Duration::from_secs(1), receiver.recv(&mut buf))
            .await
            .unwrap()
            .unwrap();
        let parsed = ingestion::parse_frame(&buf[..n]).unwrap();

        assert!(parsed.frame_number() >= 1);
        assert!(!parsed.tracks.is_empty());
        assert!(parsed.tracks.len() <= 4);
        // global ids are allocated from 1, never the synthetic local ids
        assert!(parsed.tracks.iter().all(|t| t.local_id >= 1 && t.local_id < 1000));
    }

    /// 无输出目标时管道仍可正常启动与停止
    #[tokio::test]
    async fn test_e2e_without_sinks_shuts_down_cleanly() {
        let radars = vec![radar(
            "solo",
            [0.0, 0.0, 0.0],
            ByteSourceConfig::Synthetic(SyntheticConfig::default()),
        )];

        let run = tokio::time::timeout(
            Duration::from_secs(10),
            run_pipeline(radars, Vec::new(), Duration::from_millis(300)),
        )
        .await
        .expect("pipeline run timed out");

        assert!(run.sinks.is_empty());
        assert!(run.scheduler.cycles > 0);
        assert!(run.ingest[0].frames_parsed > 0);
    }
}
