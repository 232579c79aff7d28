use egui::Context as EguiContext;
use flyby_common::ModelId;
use flyby_game::Game;
use flyby_scene::Model;
use flyby_tools::{FrameStats, InspectorState, LogBuffer, ModelInspector};

/// Messages shown in the log window.
const LOG_LINES: usize = 50;

/// Debug windows drawn on top of the scene every frame.
pub fn draw(
    ctx: &EguiContext,
    game: &mut Game,
    inspector: &mut InspectorState,
    logs: &LogBuffer,
    stats: FrameStats,
) {
    egui::Area::new(egui::Id::new("fps_overlay"))
        .anchor(egui::Align2::LEFT_TOP, [8.0, 8.0])
        .show(ctx, |ui| {
            ui.label(egui::RichText::new(stats.to_string()).monospace());
        });

    let ids: Vec<ModelId> = game.scene().iter().map(Model::id).collect();

    egui::Window::new("Models")
        .default_pos([8.0, 40.0])
        .show(ctx, |ui| {
            ui.label(ModelInspector::summary(game.scene()).to_string());
            ui.label(format!(
                "Ship velocity: {:.2}  Instances: {}",
                game.ship_velocity(),
                game.instances().len()
            ));
            ui.separator();
            for id in &ids {
                let mut visible = inspector.is_visible(*id);
                let label = game
                    .scene()
                    .get(*id)
                    .map(model_label)
                    .unwrap_or_default();
                if ui.checkbox(&mut visible, label).changed() {
                    inspector.set_visible(*id, visible);
                }
            }
            ui.separator();
            ui.small("F: fullscreen | M: mouse capture | Esc: quit");
        });

    for id in ids {
        if !inspector.is_visible(id) {
            continue;
        }
        let mut open = true;
        egui::Window::new(format!("Model {}", id.0))
            .id(egui::Id::new(("model", id.0)))
            .open(&mut open)
            .show(ctx, |ui| model_panel(ui, game, id));
        if !open {
            inspector.set_visible(id, false);
        }
    }

    egui::Window::new("Log")
        .default_width(480.0)
        .show(ctx, |ui| {
            egui::ScrollArea::vertical()
                .max_height(240.0)
                .show(ui, |ui| {
                    for entry in logs.first(LOG_LINES) {
                        ui.label(
                            egui::RichText::new(format!(
                                "{:>9.3} {} {}",
                                entry.timestamp.as_secs_f64(),
                                entry.level,
                                entry.text
                            ))
                            .monospace(),
                        );
                    }
                });
            if logs.dropped() > 0 {
                ui.small(format!("{} later messages not kept", logs.dropped()));
            }
        });
}

fn model_label(model: &Model) -> String {
    let name = model
        .source()
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "<procedural>".to_string());
    format!("{} {name}", model.id().0)
}

fn model_panel(ui: &mut egui::Ui, game: &mut Game, id: ModelId) {
    let Some(model) = game.scene_mut().get_mut(id) else {
        ui.label("model removed");
        return;
    };

    ui.label("Position");
    ui.horizontal(|ui| {
        ui.add(egui::DragValue::new(&mut model.position.x).prefix("X: ").speed(0.1));
        ui.add(egui::DragValue::new(&mut model.position.y).prefix("Y: ").speed(0.1));
        ui.add(egui::DragValue::new(&mut model.position.z).prefix("Z: ").speed(0.1));
    });
    ui.label("Rotation (degrees)");
    ui.horizontal(|ui| {
        ui.add(egui::DragValue::new(&mut model.rotation.angle_x).prefix("X: "));
        ui.add(egui::DragValue::new(&mut model.rotation.angle_y).prefix("Y: "));
        ui.add(egui::DragValue::new(&mut model.rotation.angle_z).prefix("Z: "));
    });

    ui.separator();
    egui::Grid::new(("basis", id.0)).striped(true).show(ui, |ui| {
        for header in ["", "x", "y", "z"] {
            ui.label(header);
        }
        ui.end_row();
        for (name, v) in ModelInspector::basis(model) {
            ui.label(name);
            ui.label(format!("{:.3}", v.x));
            ui.label(format!("{:.3}", v.y));
            ui.label(format!("{:.3}", v.z));
            ui.end_row();
        }
    });

    ui.separator();
    let info = ModelInspector::inspect(model);
    ui.label(format!("meshes: {} total", info.meshes.len()));
    egui::Grid::new(("meshes", id.0)).striped(true).show(ui, |ui| {
        for header in ["name", "vertices", "indices", "textures"] {
            ui.strong(header);
        }
        ui.end_row();
        for mesh in &info.meshes {
            ui.label(mesh.name.as_str());
            ui.label(mesh.vertices.to_string());
            ui.label(mesh.indices.to_string());
            ui.label(mesh.textures.to_string());
            ui.end_row();
        }
    });
}
