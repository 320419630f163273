use crate::app::VncViewerApp;
use egui::{Context, Ui, Color32, Stroke};

pub fn render(app: &mut VncViewerApp, ui: &mut Ui, ctx: &Context) {
    // For now, we'll render a placeholder for the VNC desktop
    // In a complete implementation, this would integrate with rfb-display
    // and render the actual framebuffer content
    
    let available_rect = ui.available_rect_before_wrap();
    let viewport = app.viewport();
    
    // Calculate display area based on viewport settings
    let (display_width, display_height) = if let Some((content_width, content_height)) = app.content_size() {
        let zoom = app.zoom_factor();
        ((content_width as f32 * zoom) as u32, (content_height as f32 * zoom) as u32)
    } else {
        (800, 600) // Default size when not connected
    };
    
    // Create scrollable area for panning
    egui::ScrollArea::both()
        .auto_shrink([false; 2])
        .show(ui, |ui| {
            // Reserve space for the display
            let display_size = egui::vec2(display_width as f32, display_height as f32);
            let (rect, response) = ui.allocate_exact_size(display_size, egui::Sense::click_and_drag());
            
            // Draw the desktop background
            ui.painter().rect_filled(
                rect,
egui::Rounding::ZERO,
                if matches!(app.state(), crate::app::AppState::Connected(_)) {
                    Color32::BLACK // Connected - black background for VNC content
                } else {
                    Color32::DARK_GRAY // Not connected - gray placeholder
                }
            );
            
            // Draw border
            ui.painter().rect_stroke(
                rect,
                egui::Rounding::ZERO,
                Stroke::new(1.0, Color32::GRAY)
            );
            
            // Placeholder content when connected
            if matches!(app.state(), crate::app::AppState::Connected(_)) {
                // In a real implementation, this is where we would:
                // 1. Get the latest framebuffer from rfb-client
                // 2. Convert it to an egui::ColorImage or texture
                // 3. Render it using ui.painter().image()
                
                // For now, show a placeholder message
                let text_pos = rect.center() - egui::vec2(0.0, 10.0);
                ui.painter().text(
                    text_pos,
                    egui::Align2::CENTER_CENTER,
                    "VNC Desktop Content\n(Framebuffer rendering not yet implemented)",
                    egui::FontId::proportional(16.0),
                    Color32::WHITE,
                );
                
                // Show viewport info
                let info_text = format!(
                    "Display: {}x{}\nZoom: {:.0}%\nScale Mode: {:?}",
                    display_width,
                    display_height,
                    app.zoom_factor() * 100.0,
                    app.scale_mode()
                );
                
                let info_pos = rect.center() + egui::vec2(0.0, 40.0);
                ui.painter().text(
                    info_pos,
                    egui::Align2::CENTER_CENTER,
                    info_text,
                    egui::FontId::proportional(12.0),
                    Color32::LIGHT_GRAY,
                );
            } else {
                // Not connected - show instructions
                let text_pos = rect.center();
                ui.painter().text(
                    text_pos,
                    egui::Align2::CENTER_CENTER,
                    "Use File → New Connection to connect to a VNC server",
                    egui::FontId::proportional(14.0),
                    Color32::LIGHT_GRAY,
                );
            }
            
            // Handle mouse input (for future VNC interaction)
            if response.hovered() && matches!(app.state(), crate::app::AppState::Connected(_)) {
                // In a real implementation, this would:
                // 1. Convert mouse position to VNC coordinates
                // 2. Send pointer events through rfb-client
                // 3. Handle scroll wheel events
                // 4. Handle clicks and drags
                
                if let Some(hover_pos) = response.hover_pos() {
                    let relative_pos = hover_pos - rect.min;
                    let vnc_x = (relative_pos.x / app.zoom_factor()) as u16;
                    let vnc_y = (relative_pos.y / app.zoom_factor()) as u16;
                    
                    // Placeholder for sending mouse events
                    // app.send_pointer_event(button_mask, vnc_x, vnc_y);
                    
                    ui.painter().circle_stroke(
                        hover_pos,
                        3.0,
                        Stroke::new(1.0, Color32::YELLOW)
                    );
                }
            }
            
            // Handle keyboard input context
            if response.has_focus() && !app.ui_state().view_only {
                // Keyboard events are handled in the main app loop
                // This just shows focus indication
                ui.painter().rect_stroke(
                    rect,
                    egui::Rounding::ZERO,
                    Stroke::new(2.0, Color32::BLUE)
                );
            }
        });
}