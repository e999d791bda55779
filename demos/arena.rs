use macroquad::prelude::*;
use std::path::Path;
use tmx_arena::render::SessionRenderer;
use tmx_arena::{input, Actor, ActorCtx, AnimationState, FsAssets, Position, Session};

fn window_conf() -> Conf {
    Conf {
        window_title: "Arena".into(),
        window_width: 1280,
        window_height: 720,
        ..Default::default()
    }
}

struct Player;

impl Actor for Player {
    fn update(&mut self, ctx: ActorCtx<'_>) {
        let Some(pos) = ctx.position else { return };
        let speed = 2.0;
        if ctx.input.left() {
            pos.x -= speed;
            pos.mirrored = true;
        }
        if ctx.input.right() {
            pos.x += speed;
            pos.mirrored = false;
        }
        if ctx.input.up() {
            pos.y -= speed;
        }
        if ctx.input.down() {
            pos.y += speed;
        }

        let moving = ctx.input.left() || ctx.input.right() || ctx.input.up() || ctx.input.down();
        let wanted = if moving { "hero_walk" } else { "hero_idle" };
        if let (Some(anim), Some(next)) = (ctx.animation, ctx.library.get(wanted)) {
            if anim.animation().name != next.name {
                anim.switch(next, ctx.now);
            }
        }
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    let mut session = Session::load(Path::new("assets/session.json"), &FsAssets)
        .expect("Failed to load session");

    let player = session.spawn();
    session.set_position(player, Position { x: 64.0, y: 64.0, mirrored: false });
    if let Some(idle) = session.library.get("hero_idle") {
        session.set_animation(player, AnimationState::new(idle, get_time() * 1000.0));
    }
    session.set_actor(player, Player);

    let mut renderer = SessionRenderer::new(&session);

    loop {
        let now = get_time() * 1000.0;
        // macroquad reports no focus changes, so P stands in for losing and
        // regaining the window
        if is_key_pressed(KeyCode::P) {
            let active = !session.input.is_active();
            session.set_focus(active, now);
        }
        input::poll_macroquad(&mut session.input, now);
        session.frame(now);

        let [r, g, b] = session.clear_color;
        clear_background(Color::from_rgba(r, g, b, 255));
        renderer.draw(&session, Vec2::ZERO);

        if !session.is_running() {
            draw_text("PAUSED", 20.0, 55.0, 30.0, YELLOW);
        }
        draw_text(
            &format!("FPS: {}", get_fps()),
            screen_width() - 135.0,
            55.0,
            30.0,
            RED,
        );

        next_frame().await;
    }
}
