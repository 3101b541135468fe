fn main() {
    if let Err(err) = native::run() {
        eprintln!("tess_cli error: {err}");
        std::process::exit(1);
    }
}

mod native {
    use brep_tess::geom::{
        BrepModel, GeomMesh, GeomMeshDiagnostics, Vec3, box_shell, cylinder_bridged, cylinder_with_seam, pillow,
        sphere_shell, torus_shell,
    };
    use brep_tess::{TessEngine, TessReport, TessSettings};
    use std::fmt::Write as _;
    use std::fs::{self, File};
    use std::io::{BufWriter, Write};
    use std::path::{Path, PathBuf};

    const SNAPSHOT_QUANTIZE: f64 = 1e-6;
    const SNAPSHOT_DECIMALS: usize = 6;

    const USAGE: &str = r#"tess_cli (brep-tess)

USAGE:
  tess_cli list
  tess_cli run <scenario|all> [options]

SCENARIOS:
  cube
  cylinder
  cylinder_bridged
  torus
  sphere
  pillow

OPTIONS (run):
  --out-dir <dir>      Write <scenario>.obj and/or <scenario>.snap to this dir (required for `all`)
  --obj <path>         Write OBJ (single scenario only)
  --snap <path>        Write snapshot (single scenario only)
  --no-obj             Skip OBJ when using --out-dir
  --no-snap            Skip snapshot when using --out-dir
  --settings <path>    Read tessellation settings from an XML element, e.g. <tess rel="0.005"/>
  --overwrite          Overwrite existing output files
  -v, --verbose        Log per-patch details (same as RUST_LOG=debug)
  -h, --help           Show this help
"#;

    pub fn run() -> Result<(), String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let verbose = args.iter().any(|a| a == "-v" || a == "--verbose");
        init_logging(verbose);

        let mut args = Args::new(args.into_iter().filter(|a| a != "-v" && a != "--verbose").collect());

        let Some(command) = args.next() else {
            print_usage();
            return Ok(());
        };

        match command.as_str() {
            "list" => {
                print_scenarios();
                Ok(())
            }
            "run" => cmd_run(&mut args),
            "-h" | "--help" | "help" => {
                print_usage();
                Ok(())
            }
            other => Err(format!("unknown command `{other}`\n\n{USAGE}")),
        }
    }

    fn init_logging(verbose: bool) {
        let default = if verbose { "debug" } else { "warn" };
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
            .format_timestamp(None)
            .try_init();
    }

    fn print_usage() {
        println!("{USAGE}");
    }

    fn print_scenarios() {
        for scenario in Scenario::ALL {
            println!("{}", scenario.name());
        }
    }

    fn cmd_run(args: &mut Args) -> Result<(), String> {
        let scenario_name = args.next().ok_or("missing scenario name")?;

        let mut out_dir: Option<PathBuf> = None;
        let mut obj_path: Option<PathBuf> = None;
        let mut snap_path: Option<PathBuf> = None;
        let mut settings_path: Option<PathBuf> = None;
        let mut overwrite = false;
        let mut write_obj = true;
        let mut write_snap = true;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--out-dir" => out_dir = Some(PathBuf::from(args.value("--out-dir")?)),
                "--obj" => obj_path = Some(PathBuf::from(args.value("--obj")?)),
                "--snap" => snap_path = Some(PathBuf::from(args.value("--snap")?)),
                "--settings" => settings_path = Some(PathBuf::from(args.value("--settings")?)),
                "--overwrite" => overwrite = true,
                "--no-obj" => write_obj = false,
                "--no-snap" => write_snap = false,
                "-h" | "--help" => {
                    print_usage();
                    return Ok(());
                }
                other => return Err(format!("unknown option `{other}`\n\n{USAGE}")),
            }
        }

        let settings = match settings_path.as_deref() {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|e| format!("read {}: {e}", path.display()))?;
                TessSettings::from_xml_str(&text).map_err(|e| format!("{}: {e}", path.display()))?
            }
            None => TessSettings::default(),
        };

        if let Some(dir) = out_dir.as_ref() {
            if obj_path.is_some() || snap_path.is_some() {
                return Err("use either --out-dir or --obj/--snap (not both)".to_string());
            }
            if !write_obj && !write_snap {
                return Err("nothing to write (both --no-obj and --no-snap set)".to_string());
            }

            fs::create_dir_all(dir).map_err(|e| format!("create out dir: {e}"))?;

            if scenario_name == "all" {
                for scenario in Scenario::ALL {
                    run_one_scenario_to_dir(*scenario, &settings, dir, write_obj, write_snap, overwrite)?;
                }
                return Ok(());
            }

            let scenario = Scenario::from_str(scenario_name.as_str()).ok_or_else(|| unknown_scenario(&scenario_name))?;
            return run_one_scenario_to_dir(scenario, &settings, dir, write_obj, write_snap, overwrite);
        }

        if scenario_name == "all" {
            return Err("`run all` requires --out-dir".to_string());
        }

        let scenario = Scenario::from_str(scenario_name.as_str()).ok_or_else(|| unknown_scenario(&scenario_name))?;
        let output = run_scenario(scenario, &settings)?;

        if let Some(path) = snap_path.as_deref() {
            write_text_file(path, &output.snapshot, overwrite)?;
            eprintln!("wrote {}", path.display());
        } else {
            print!("{}", output.snapshot);
        }

        if let Some(path) = obj_path.as_deref() {
            write_obj_file(path, &output.mesh, output.name, overwrite)?;
            eprintln!("wrote {}", path.display());
        }

        report(&output);
        Ok(())
    }

    fn run_one_scenario_to_dir(
        scenario: Scenario,
        settings: &TessSettings,
        dir: &Path,
        write_obj: bool,
        write_snap: bool,
        overwrite: bool,
    ) -> Result<(), String> {
        let output = run_scenario(scenario, settings)?;

        if write_snap {
            let path = dir.join(format!("{}.snap", output.name));
            write_text_file(&path, &output.snapshot, overwrite)?;
            eprintln!("wrote {}", path.display());
        }

        if write_obj {
            let path = dir.join(format!("{}.obj", output.name));
            write_obj_file(&path, &output.mesh, output.name, overwrite)?;
            eprintln!("wrote {}", path.display());
        }

        report(&output);
        Ok(())
    }

    fn report(output: &ScenarioOutput) {
        eprintln!(
            "{}: vertices={} triangles={} | {}",
            output.name,
            output.mesh.vertex_count(),
            output.mesh.triangle_count(),
            output.report.diagnostics.summary()
        );
        for skip in &output.report.skipped {
            eprintln!("  {skip}");
        }
    }

    fn unknown_scenario(name: &str) -> String {
        let mut msg = String::new();
        let _ = writeln!(msg, "unknown scenario `{name}`\n\navailable scenarios:");
        for scenario in Scenario::ALL {
            let _ = writeln!(msg, "  {}", scenario.name());
        }
        msg
    }

    fn write_text_file(path: &Path, text: &str, overwrite: bool) -> Result<(), String> {
        if path.exists() && !overwrite {
            return Err(format!(
                "refusing to overwrite existing file {} (use --overwrite)",
                path.display()
            ));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("create dir {}: {e}", parent.display()))?;
        }
        fs::write(path, normalize_snapshot_text(text)).map_err(|e| format!("write {}: {e}", path.display()))
    }

    fn write_obj_file(path: &Path, mesh: &GeomMesh, name: &str, overwrite: bool) -> Result<(), String> {
        mesh.validate().map_err(|e| format!("mesh validation failed: {e}"))?;

        if path.exists() && !overwrite {
            return Err(format!(
                "refusing to overwrite existing file {} (use --overwrite)",
                path.display()
            ));
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("create dir {}: {e}", parent.display()))?;
        }

        let file = File::create(path).map_err(|e| format!("create {}: {e}", path.display()))?;
        let mut w = BufWriter::new(file);

        writeln!(w, "# brep-tess tess_cli").map_err(|e| format!("write obj: {e}"))?;
        writeln!(w, "o {name}").map_err(|e| format!("write obj: {e}"))?;

        for p in mesh.positions.iter().copied() {
            writeln!(w, "v {} {} {}", p[0], p[1], p[2]).map_err(|e| format!("write obj: {e}"))?;
        }

        if let Some(normals) = mesh.normals.as_ref() {
            for n in normals.iter().copied() {
                writeln!(w, "vn {} {} {}", n[0], n[1], n[2]).map_err(|e| format!("write obj: {e}"))?;
            }
        }

        let has_normals = mesh.normals.is_some();
        for tri in mesh.indices.chunks_exact(3) {
            let (a, b, c) = (tri[0] + 1, tri[1] + 1, tri[2] + 1);
            if has_normals {
                writeln!(w, "f {a}//{a} {b}//{b} {c}//{c}")
            } else {
                writeln!(w, "f {a} {b} {c}")
            }
            .map_err(|e| format!("write obj: {e}"))?;
        }

        w.flush().map_err(|e| format!("flush {}: {e}", path.display()))
    }

    fn normalize_snapshot_text(text: &str) -> String {
        let normalized = text.replace("\r\n", "\n");
        if normalized.ends_with('\n') {
            normalized
        } else {
            format!("{normalized}\n")
        }
    }

    fn quantize_f64(value: f64) -> f64 {
        if !value.is_finite() {
            return value;
        }
        let q = (value / SNAPSHOT_QUANTIZE).round() * SNAPSHOT_QUANTIZE;
        if q == 0.0 { 0.0 } else { q }
    }

    fn write_vec3_line(out: &mut String, prefix: &str, v: [f64; 3]) {
        let _ = writeln!(
            out,
            "{prefix} {:.SNAPSHOT_DECIMALS$} {:.SNAPSHOT_DECIMALS$} {:.SNAPSHOT_DECIMALS$}",
            quantize_f64(v[0]),
            quantize_f64(v[1]),
            quantize_f64(v[2])
        );
    }

    fn write_mesh_diagnostics(out: &mut String, diag: &GeomMeshDiagnostics) {
        let _ = writeln!(out, "mesh_diag.vertex_count {}", diag.vertex_count);
        let _ = writeln!(out, "mesh_diag.triangle_count {}", diag.triangle_count);
        let _ = writeln!(out, "mesh_diag.welded_vertex_count {}", diag.welded_vertex_count);
        let _ = writeln!(out, "mesh_diag.flipped_edge_count {}", diag.flipped_edge_count);
        let _ = writeln!(out, "mesh_diag.degenerate_triangle_count {}", diag.degenerate_triangle_count);
        let _ = writeln!(out, "mesh_diag.open_edge_count {}", diag.open_edge_count);
        let _ = writeln!(out, "mesh_diag.non_manifold_edge_count {}", diag.non_manifold_edge_count);
        let _ = writeln!(out, "mesh_diag.skipped_steiner_count {}", diag.skipped_steiner_count);
        let _ = writeln!(out, "mesh_diag.skipped_patch_count {}", diag.skipped_patch_count);
        let _ = writeln!(out, "mesh_diag.capped_patch_count {}", diag.capped_patch_count);
        let _ = writeln!(out, "mesh_diag.edge_cache_misses {}", diag.edge_cache_misses);
        let _ = writeln!(out, "mesh_diag.edge_cache_hits {}", diag.edge_cache_hits);
        let _ = writeln!(out, "mesh_diag.warning_count {}", diag.warnings.len());
        for (idx, warning) in diag.warnings.iter().enumerate() {
            let _ = writeln!(out, "mesh_diag.warning.{idx} {warning}");
        }
    }

    fn write_mesh(out: &mut String, mesh: &GeomMesh) {
        let _ = writeln!(out, "mesh.vertex_count {}", mesh.vertex_count());
        let _ = writeln!(out, "mesh.triangle_count {}", mesh.triangle_count());
        let _ = write!(out, "mesh.signed_volume ");
        let _ = writeln!(out, "{:.SNAPSHOT_DECIMALS$}", quantize_f64(mesh.signed_volume()));

        let _ = writeln!(out, "mesh.positions {}", mesh.positions.len());
        for p in mesh.positions.iter().copied() {
            write_vec3_line(out, "p", p);
        }

        let _ = writeln!(out, "mesh.indices {}", mesh.indices.len());
        for tri in mesh.indices.chunks_exact(3) {
            let _ = writeln!(out, "i {} {} {}", tri[0], tri[1], tri[2]);
        }
    }

    fn snapshot(name: &str, mesh: &GeomMesh, report: &TessReport) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# brep-tess snapshot v1");
        let _ = writeln!(out, "scenario {name}");
        let _ = writeln!(out, "quantize {SNAPSHOT_QUANTIZE:.1e}");
        let _ = writeln!(out, "skipped_patches {}", report.skipped.len());
        for skip in &report.skipped {
            let _ = writeln!(out, "skip {skip}");
        }
        write_mesh_diagnostics(&mut out, &report.diagnostics);
        write_mesh(&mut out, mesh);
        normalize_snapshot_text(&out)
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Scenario {
        Cube,
        Cylinder,
        CylinderBridged,
        Torus,
        Sphere,
        Pillow,
    }

    impl Scenario {
        const ALL: &'static [Scenario] = &[
            Scenario::Cube,
            Scenario::Cylinder,
            Scenario::CylinderBridged,
            Scenario::Torus,
            Scenario::Sphere,
            Scenario::Pillow,
        ];

        fn name(self) -> &'static str {
            match self {
                Scenario::Cube => "cube",
                Scenario::Cylinder => "cylinder",
                Scenario::CylinderBridged => "cylinder_bridged",
                Scenario::Torus => "torus",
                Scenario::Sphere => "sphere",
                Scenario::Pillow => "pillow",
            }
        }

        fn from_str(name: &str) -> Option<Self> {
            Self::ALL.iter().copied().find(|s| s.name() == name)
        }

        fn model(self) -> Result<BrepModel, String> {
            match self {
                Scenario::Cube => box_shell(Vec3::new(1.0, 1.0, 1.0)),
                Scenario::Cylinder => cylinder_with_seam(1.0, 2.0),
                Scenario::CylinderBridged => cylinder_bridged(1.0, 2.0, 0.25),
                Scenario::Torus => torus_shell(2.0, 0.5),
                Scenario::Sphere => sphere_shell(1.0),
                Scenario::Pillow => pillow(),
            }
        }
    }

    struct ScenarioOutput {
        name: &'static str,
        mesh: GeomMesh,
        report: TessReport,
        snapshot: String,
    }

    fn run_scenario(scenario: Scenario, settings: &TessSettings) -> Result<ScenarioOutput, String> {
        let model = scenario.model()?;
        let engine = TessEngine::new(&model, settings.clone()).map_err(|e| e.to_string())?;
        let (mesh, report) = engine.tessellate_mesh();
        let name = scenario.name();
        let snapshot = snapshot(name, &mesh, &report);

        Ok(ScenarioOutput {
            name,
            mesh,
            report,
            snapshot,
        })
    }

    struct Args {
        args: Vec<String>,
        pos: usize,
    }

    impl Args {
        fn new(args: Vec<String>) -> Self {
            Self { args, pos: 0 }
        }

        fn next(&mut self) -> Option<String> {
            let arg = self.args.get(self.pos)?.clone();
            self.pos += 1;
            Some(arg)
        }

        fn value(&mut self, flag: &str) -> Result<String, String> {
            self.next().ok_or_else(|| format!("missing value for {flag}"))
        }
    }
}
